//! Reverse index persistence and the query gateway in front of it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;
use crate::types::IndexQueryResult;

/// One method and the tests known to exercise it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    /// Fully qualified method, e.g. `com.acme.Foo.bar`.
    pub method: String,
    /// Covering tests in index form, e.g. `com-acme-FooTest-testBar`.
    pub tests: Vec<String>,
}

/// On-disk layout of the index file. Entries are strictly sorted by method.
#[derive(Debug, Serialize, Deserialize)]
struct IndexDocument {
    /// The ordered list of entries.
    #[serde(default)]
    entries: Vec<IndexEntry>,
}

/// Reverse index persisted as TOML, loaded on first query.
///
/// Loading happens at most once; the outcome (entries or failure reason)
/// is cached so concurrent readers share it.
#[derive(Debug)]
pub struct IndexFile {
    /// Parsed entries, or the reason they could not be loaded.
    loaded: OnceLock<Result<HashMap<String, Vec<String>>, String>>,
    /// Location of the index file.
    path: PathBuf,
}

impl IndexFile {
    /// Parse index content.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the content is not valid TOML,
    /// or `Error::IndexCorrupt` if entries are not strictly sorted.
    pub fn parse(content: &str) -> Result<HashMap<String, Vec<String>>, Error> {
        let document: IndexDocument = toml::from_str(content)?;
        enforce_index_entry_ordering(&document.entries)?;
        return Ok(document
            .entries
            .into_iter()
            .map(|e| return (e.method, e.tests))
            .collect());
    }

    /// Bind to an index file. Nothing is read until the first query.
    pub fn open(path: PathBuf) -> Self {
        return Self {
            loaded: OnceLock::new(),
            path,
        };
    }

    /// Read and parse the file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` on read failure, `Error::TomlDe` or
    /// `Error::IndexCorrupt` on bad content.
    fn load(path: &Path) -> Result<HashMap<String, Vec<String>>, Error> {
        let content = std::fs::read_to_string(path)?;
        let entries = Self::parse(&content)?;
        debug!(path = %path.display(), entries = entries.len(), "loaded test index");
        return Ok(entries);
    }
}

impl TestDiscoveryIndex for IndexFile {
    fn query(&self, key: &str) -> Result<Option<Vec<String>>, Error> {
        let loaded = self
            .loaded
            .get_or_init(|| return Self::load(&self.path).map_err(|e| return e.to_string()));
        return match loaded {
            Err(reason) => Err(Error::IndexUnavailable {
                path: self.path.clone(),
                reason: reason.clone(),
            }),
            Ok(entries) => Ok(entries.get(key).cloned()),
        };
    }
}

/// Query façade over a reverse index. Never fails: outcomes are values.
pub struct IndexGateway<'a> {
    /// The index being queried. Owned and released by the caller.
    index: &'a dyn TestDiscoveryIndex,
}

impl<'a> IndexGateway<'a> {
    /// Look up the raw patterns for `key`.
    pub fn lookup(&self, key: &str) -> IndexQueryResult {
        return match self.index.query(key) {
            Err(e) => {
                warn!(key, error = %e, "test index lookup failed");
                IndexQueryResult::Failed(e.to_string())
            },
            Ok(None) => {
                debug!(key, "no test index entry");
                IndexQueryResult::Missing
            },
            Ok(Some(patterns)) => IndexQueryResult::Found(patterns),
        };
    }

    /// Wrap `index` for querying.
    pub fn new(index: &'a dyn TestDiscoveryIndex) -> Self {
        return Self { index };
    }
}

/// A persisted mapping from qualified method to covering test patterns.
/// Read-only from this crate's point of view and safe for concurrent readers.
pub trait TestDiscoveryIndex: Send + Sync {
    /// Raw patterns for `key`; `Ok(None)` when the key has no entry.
    ///
    /// # Errors
    ///
    /// Returns an error when the index cannot be read.
    fn query(&self, key: &str) -> Result<Option<Vec<String>>, Error>;
}

/// Validate that index entries are strictly sorted by method.
///
/// # Errors
///
/// Returns `Error::IndexCorrupt` if any adjacent pair is out of order or repeated.
fn enforce_index_entry_ordering(entries: &[IndexEntry]) -> Result<(), Error> {
    for window in entries.windows(2) {
        let (Some(first), Some(second)) = (window.first(), window.get(1)) else {
            return Err(Error::IndexCorrupt {
                reason: "window underflow".to_string(),
            });
        };
        if first.method >= second.method {
            return Err(Error::IndexCorrupt {
                reason: format!("entries not sorted: {} >= {}", first.method, second.method),
            });
        }
    }
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
[[entries]]
method = "com.Foo.bar"
tests = ["com-FooTest-test1", "com-FooTest-test2"]

[[entries]]
method = "pkg.Cls.m"
tests = ["pkg-ClsTest-testM"]
"#;

    #[test]
    fn parse_keeps_test_order() {
        let entries = IndexFile::parse(INDEX).unwrap();
        assert_eq!(
            entries.get("com.Foo.bar").unwrap(),
            &vec!["com-FooTest-test1".to_string(), "com-FooTest-test2".to_string()]
        );
    }

    #[test]
    fn unsorted_entries_are_corrupt() {
        let content = r#"
[[entries]]
method = "b"
tests = []

[[entries]]
method = "a"
tests = []
"#;
        assert!(matches!(IndexFile::parse(content), Err(Error::IndexCorrupt { .. })));
    }

    #[test]
    fn query_reads_file_once_and_distinguishes_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".testimpact.index");
        std::fs::write(&path, INDEX).unwrap();
        let index = IndexFile::open(path.clone());

        assert_eq!(
            index.query("pkg.Cls.m").unwrap(),
            Some(vec!["pkg-ClsTest-testM".to_string()])
        );
        std::fs::remove_file(&path).unwrap();
        assert_eq!(index.query("no.Such.key").unwrap(), None, "cached after first load");
    }

    #[test]
    fn missing_file_is_an_io_failure_per_query() {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexFile::open(dir.path().join("absent.index"));
        assert!(matches!(index.query("a.B.c"), Err(Error::IndexUnavailable { .. })));
        assert!(matches!(index.query("a.B.d"), Err(Error::IndexUnavailable { .. })));
    }

    #[test]
    fn gateway_turns_outcomes_into_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("i.index");
        std::fs::write(&path, INDEX).unwrap();
        let index = IndexFile::open(path);
        let gateway = IndexGateway::new(&index);

        assert_eq!(
            gateway.lookup("pkg.Cls.m"),
            IndexQueryResult::Found(vec!["pkg-ClsTest-testM".to_string()])
        );
        assert_eq!(gateway.lookup("pkg.Cls.other"), IndexQueryResult::Missing);

        let broken = IndexFile::open(dir.path().join("nope.index"));
        let gateway = IndexGateway::new(&broken);
        assert!(matches!(gateway.lookup("pkg.Cls.m"), IndexQueryResult::Failed(_)));
    }
}
