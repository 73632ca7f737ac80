//! Delivery of a finished selection to its consumer.

use std::io::Write;

use serde::Serialize;

use crate::error::Error;
use crate::types::PatternSet;

/// Serialized shape of a selection in JSON output.
#[derive(Serialize)]
struct SelectionReport<'a> {
    /// Selected patterns, in selection order.
    patterns: &'a PatternSet,
}

/// Consumer of a resolution task's result. Called once per completed task.
pub trait PatternSink {
    /// Receive the final pattern set.
    ///
    /// # Errors
    ///
    /// Returns an error if the patterns cannot be written.
    fn deliver(&mut self, patterns: &PatternSet) -> Result<(), Error>;
}

/// Writes `{"patterns": [...]}` followed by a newline.
pub struct JsonSink<W: Write> {
    /// Destination, usually stdout.
    out: W,
}

impl<W: Write> JsonSink<W> {
    /// Write JSON to `out`.
    pub fn new(out: W) -> Self {
        return Self { out };
    }
}

impl<W: Write> PatternSink for JsonSink<W> {
    fn deliver(&mut self, patterns: &PatternSet) -> Result<(), Error> {
        serde_json::to_writer_pretty(&mut self.out, &SelectionReport { patterns })?;
        writeln!(self.out)?;
        self.out.flush()?;
        return Ok(());
    }
}

/// Writes one pattern per line. An empty selection writes nothing.
pub struct TextSink<W: Write> {
    /// Destination, usually stdout.
    out: W,
}

impl<W: Write> TextSink<W> {
    /// Write lines to `out`.
    pub fn new(out: W) -> Self {
        return Self { out };
    }
}

impl<W: Write> PatternSink for TextSink<W> {
    fn deliver(&mut self, patterns: &PatternSet) -> Result<(), Error> {
        for pattern in patterns {
            writeln!(self.out, "{pattern}")?;
        }
        self.out.flush()?;
        return Ok(());
    }
}
