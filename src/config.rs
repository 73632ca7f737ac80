use std::path::{Path, PathBuf};

use crate::error::Error;

/// Default location of the reverse index, relative to the root.
const DEFAULT_INDEX: &str = ".testimpact.index";

/// Maximum source file size that will be diffed (16 MiB).
const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Project configuration loaded from `.testimpact.toml`.
/// Include/exclude patterns are path prefixes applied to changed files.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path prefixes that exclude an otherwise included file.
    exclude: Vec<String>,
    /// Path prefixes of files to scan. Empty means everything.
    include: Vec<String>,
    /// Reverse index location, relative to the root.
    pub index: PathBuf,
    /// Worker threads used by scan mode.
    pub jobs: usize,
    /// Files above this size are skipped as too large to diff.
    pub max_file_size: u64,
}

/// Raw TOML structure for `.testimpact.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TestimpactTomlConfig {
    /// See [`Config::exclude`].
    #[serde(default)]
    exclude: Vec<String>,
    /// See [`Config::include`].
    #[serde(default)]
    include: Vec<String>,
    /// See [`Config::index`].
    index: Option<PathBuf>,
    /// See [`Config::jobs`].
    jobs: Option<usize>,
    /// See [`Config::max_file_size`].
    max_file_size: Option<u64>,
}

impl Config {
    /// Load config from `.testimpact.toml` in the given root directory.
    /// Returns a default that scans everything if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(".testimpact.toml");
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::scan_everything_by_default());
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };

        return Self::parse(&content);
    }

    /// Parse config from TOML content.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: TestimpactTomlConfig = toml::from_str(content)?;
        return Ok(Self {
            exclude: raw.exclude,
            include: raw.include,
            index: raw.index.unwrap_or_else(|| return PathBuf::from(DEFAULT_INDEX)),
            jobs: raw.jobs.unwrap_or(1).max(1),
            max_file_size: raw.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE),
        });
    }

    /// Default config that includes everything and excludes nothing.
    fn scan_everything_by_default() -> Self {
        return Self {
            exclude: Vec::new(),
            include: Vec::new(),
            index: PathBuf::from(DEFAULT_INDEX),
            jobs: 1,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        };
    }

    /// Check whether a changed file path should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

impl Default for Config {
    fn default() -> Self {
        return Self::scan_everything_by_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_scans_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.should_scan("anything/at/all.java"), "default config must scan all");
        assert_eq!(config.index, PathBuf::from(DEFAULT_INDEX));
        assert_eq!(config.jobs, 1);
    }

    #[test]
    fn include_then_exclude() {
        let config = Config::parse(
            r#"
include = ["src/"]
exclude = ["src/generated/"]
"#,
        )
        .unwrap();
        assert!(config.should_scan("src/main/Foo.java"), "included prefix");
        assert!(!config.should_scan("src/generated/Bar.java"), "excluded prefix");
        assert!(!config.should_scan("docs/readme.md"), "outside include");
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::parse(
            r#"
index = "build/impact.index"
jobs = 0
max_file_size = 1024
"#,
        )
        .unwrap();
        assert_eq!(config.index, PathBuf::from("build/impact.index"));
        assert_eq!(config.jobs, 1, "zero workers is clamped to one");
        assert_eq!(config.max_file_size, 1024);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".testimpact.toml"), "jobs = \"many\"").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));
    }
}
