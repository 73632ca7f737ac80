use std::path::Path;

use crate::error::Error;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where the user can
/// act on it, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::FileTooLarge {
            file,
            max_bytes,
            size_bytes,
        } => render_file_too_large(file, *size_bytes, *max_bytes),
        Error::IndexCorrupt { reason } => render_index_corrupt(reason),
        Error::IndexUnavailable { path, reason } => render_index_unavailable(path, reason),
        Error::UnsupportedLanguage { ext } => render_unsupported_language(ext),
        Error::Vcs { command, reason } => render_vcs(command, reason),
        _ => render_generic(e),
    };
}

fn render_file_too_large(file: &Path, size_bytes: u64, max_bytes: u64) -> String {
    return format!(
        "\
# Error: File Too Large

`{}` is {size_bytes} bytes (max {max_bytes}).

## Fix

Raise the limit in `.testimpact.toml`:

    max_file_size = {size_bytes}
",
        file.display()
    );
}

fn render_generic(e: &Error) -> String {
    return match e {
        Error::Cancelled => "\
# Cancelled

The selection was cancelled before it finished. No patterns were written.
"
        .to_string(),

        Error::FileNotFound { path } => format!(
            "\
# Error: File Not Found

`{}` does not exist.
",
            path.display()
        ),

        Error::Io(e) => format!(
            "\
# Error: I/O

{e}
"
        ),

        Error::ParseFailed { file, reason } => format!(
            "\
# Error: Parse Failed

Could not parse `{}`: {reason}
",
            file.display()
        ),

        Error::TomlDe(e) => format!(
            "\
# Error: Invalid TOML

{e}

## Fix

Check `.testimpact.toml`. Known keys are `include`, `exclude`, `index`,
`max_file_size` and `jobs`.
"
        ),

        Error::Watch { reason } => format!(
            "\
# Error: Watch Failed

{reason}
"
        ),

        _ => format!(
            "\
# Error

{e}
"
        ),
    };
}

fn render_index_corrupt(reason: &str) -> String {
    return format!(
        "\
# Error: Index Corrupt

{reason}

## Fix

Entries must be strictly sorted by `method` with no duplicates.
Regenerate the index with the tool that produced it.
"
    );
}

fn render_index_unavailable(path: &Path, reason: &str) -> String {
    return format!(
        "\
# Error: Index Unavailable

Could not read `{}`: {reason}

## Fix

Point to an existing index:

    testimpact --index path/to/.testimpact.index select

or set `index` in `.testimpact.toml`.
",
        path.display()
    );
}

fn render_unsupported_language(ext: &str) -> String {
    return format!(
        "\
# Error: Unsupported Language

No tree-sitter grammar for `.{ext}` files.

## Supported extensions

- `.java`: Java
- `.rs`: Rust
- `.py`: Python
- `.go`: Go
- `.ts`, `.tsx`, `.js`, `.jsx`: TypeScript
"
    );
}

fn render_vcs(command: &str, reason: &str) -> String {
    return format!(
        "\
# Error: Git Failed

`git {command}` failed:

    {reason}

## Fix

Run testimpact inside a git working tree, with `git` on `PATH`.
"
    );
}
