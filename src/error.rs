/// Crate-level error types for testimpact diagnostics.
use std::path::PathBuf;

/// All errors in testimpact carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the file, key, or command that failed.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The resolution task was cancelled before it completed.
    #[error("resolution cancelled")]
    Cancelled,

    /// A source file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Source file exceeds the configured size limit and cannot be diffed.
    #[error("file too large ({size_bytes} bytes, max {max_bytes}): {}", file.display())]
    FileTooLarge {
        /// File that exceeded the size limit.
        file: PathBuf,
        /// Maximum allowed file size in bytes.
        max_bytes: u64,
        /// Actual file size in bytes.
        size_bytes: u64,
    },

    /// The index file parsed but violates its ordering contract.
    #[error("index corrupt: {reason}")]
    IndexCorrupt {
        /// Description of the corruption.
        reason: String,
    },

    /// The index could not be read when a query needed it.
    #[error("index unavailable: {}: {reason}", path.display())]
    IndexUnavailable {
        /// Path of the index file.
        path: PathBuf,
        /// Why loading failed.
        reason: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization of results failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped serde error.
        #[from]
        serde_json::Error,
    ),

    /// Tree-sitter failed to parse a source file.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// File that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A built-in regular expression failed to compile.
    #[error("pattern: {0}")]
    Pattern(
        /// The wrapped regex error.
        #[from]
        regex::Error,
    ),

    /// The scan worker pool could not be created.
    #[error("thread pool: {0}")]
    ThreadPool(
        /// The wrapped rayon error.
        #[from]
        rayon::ThreadPoolBuildError,
    ),

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// No tree-sitter grammar registered for this file extension.
    #[error("no grammar for extension: .{ext}")]
    UnsupportedLanguage {
        /// File extension without the leading dot.
        ext: String,
    },

    /// A git invocation failed or produced output we could not read.
    #[error("vcs: `git {command}` failed: {reason}")]
    Vcs {
        /// The git subcommand and arguments.
        command: String,
        /// Stderr or spawn failure text.
        reason: String,
    },

    /// The filesystem watcher could not be set up.
    #[error("watch: {reason}")]
    Watch {
        /// Description of the watcher failure.
        reason: String,
    },
}
