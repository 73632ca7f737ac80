//! Git-backed change lists and changed-region computation.
//!
//! Paths exchanged with git are relative to the repository top level, which
//! is also the workspace root the rest of the crate resolves files against.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use regex::Regex;
use tracing::debug;

use crate::changes::{Change, ChangeList, ChangeListProvider, ChangeRangeResolver, ChangedFile};
use crate::error::Error;
use crate::types::{ChangeRegion, RegionKind};

/// New-side range of a unified diff hunk header: `+start` or `+start,count`.
const HUNK_HEADER: &str = r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@";

/// Change lists read from a git working tree. A change list is any revision
/// git can resolve to a commit; its changes are the working tree against it.
#[derive(Debug, Clone)]
pub struct GitChangeLists {
    /// Repository top level.
    root: PathBuf,
}

/// Changed regions computed by diffing a snapshot against a base revision.
#[derive(Debug, Clone)]
pub struct GitChangeRanges {
    /// Revision the snapshot is compared with.
    base: String,
    /// Compiled [`HUNK_HEADER`].
    hunk_header: Regex,
    /// Snapshots above this many bytes are not diffed.
    max_file_size: u64,
    /// Repository top level.
    root: PathBuf,
}

/// New-side line range of one hunk: `count` lines from 1-based `start`.
/// A zero count is a pure deletion after line `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hunk {
    /// Number of added or modified lines.
    count: usize,
    /// First line, 1-based.
    start: usize,
}

impl GitChangeLists {
    /// Read change lists from the repository at `root`.
    pub fn new(root: PathBuf) -> Self {
        return Self { root };
    }
}

impl ChangeListProvider for GitChangeLists {
    fn all_affected_files(&self) -> Result<Vec<ChangedFile>, Error> {
        let status = git_stdout(
            &self.root,
            &["status", "--porcelain=v1", "-z", "--untracked-files=all"],
        )?;
        return Ok(parse_porcelain_status(&status));
    }

    fn find_by_name(&self, name: &str) -> Result<Option<ChangeList>, Error> {
        if name.is_empty() || name.starts_with('-') {
            return Ok(None);
        }
        let commit = format!("{name}^{{commit}}");
        let verify = git(&self.root, &["rev-parse", "--verify", "--quiet", &commit])?;
        if !verify.status.success() {
            debug!(change_list = name, "not a revision");
            return Ok(None);
        }

        let diff = git_stdout(
            &self.root,
            &["diff", "--name-status", "-z", "--no-color", "-M", name, "--"],
        )?;
        let mut changes = parse_name_status(&diff);

        let untracked = git_stdout(&self.root, &["ls-files", "--others", "--exclude-standard", "-z"])?;
        changes.extend(split_nul(&untracked).into_iter().map(|path| {
            return Change {
                after: Some(PathBuf::from(path)),
                before: None,
            };
        }));

        return Ok(Some(ChangeList {
            changes,
            name: name.to_string(),
        }));
    }
}

impl GitChangeRanges {
    /// Content of `file` at the base revision, or `None` if it has none.
    ///
    /// # Errors
    ///
    /// Returns `Error::Vcs` if git cannot be run or the blob cannot be read.
    fn base_content(&self, file: &Path) -> Result<Option<String>, Error> {
        let object = format!("{}:{}", self.base, file.to_string_lossy().replace('\\', "/"));
        let exists = git(&self.root, &["cat-file", "-e", &object])?;
        if !exists.status.success() {
            debug!(file = %file.display(), base = %self.base, "no base content");
            return Ok(None);
        }
        let blob = git_stdout(&self.root, &["cat-file", "blob", &object])?;
        return Ok(Some(String::from_utf8_lossy(&blob).into_owned()));
    }

    /// Hunks of a zero-context diff from `base` to `current`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the temp files cannot be written, or
    /// `Error::Vcs` if git fails.
    fn hunks(&self, base: &str, current: &str) -> Result<Vec<Hunk>, Error> {
        let scratch = tempfile::tempdir()?;
        let before = scratch.path().join("base");
        let after = scratch.path().join("current");
        std::fs::write(&before, base)?;
        std::fs::write(&after, current)?;

        let command = "diff --no-index --unified=0";
        let output = Command::new("git")
            .current_dir(scratch.path())
            .args(["diff", "--no-index", "--no-color", "--no-ext-diff", "--unified=0", "--"])
            .arg(&before)
            .arg(&after)
            .output()
            .map_err(|e| {
                return Error::Vcs {
                    command: command.to_string(),
                    reason: e.to_string(),
                };
            })?;

        return match output.status.code() {
            Some(0) => Ok(Vec::new()),
            Some(1) => Ok(parse_hunks(&self.hunk_header, &String::from_utf8_lossy(&output.stdout))),
            _ => Err(Error::Vcs {
                command: command.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        };
    }

    /// Diff snapshots in the repository at `root` against `base`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if the hunk header pattern fails to compile.
    pub fn new(root: PathBuf, base: &str, max_file_size: u64) -> Result<Self, Error> {
        return Ok(Self {
            base: base.to_string(),
            hunk_header: Regex::new(HUNK_HEADER)?,
            max_file_size,
            root,
        });
    }
}

impl ChangeRangeResolver for GitChangeRanges {
    fn changed_ranges(&self, file: &ChangedFile, current: &str) -> Result<Vec<ChangeRegion>, Error> {
        let path = file.path.as_path();
        let size_bytes = u64::try_from(current.len()).unwrap_or(u64::MAX);
        if size_bytes > self.max_file_size {
            return Err(Error::FileTooLarge {
                file: path.to_path_buf(),
                max_bytes: self.max_file_size,
                size_bytes,
            });
        }

        let Some(base) = self.base_content(file.origin.as_deref().unwrap_or(path))? else {
            return Ok(whole_content(path, current).into_iter().collect());
        };
        let hunks = self.hunks(&base, current)?;
        let starts = line_starts(current);
        return Ok(hunks
            .into_iter()
            .filter_map(|hunk| return region_for_hunk(path, current, &starts, hunk))
            .collect());
    }
}

/// Offset of the first non-whitespace byte in `range`.
fn first_non_whitespace(bytes: &[u8], range: Range<usize>) -> Option<usize> {
    let start = range.start;
    let offset = bytes.get(range)?.iter().position(|b| return !b.is_ascii_whitespace())?;
    return Some(start.saturating_add(offset));
}

/// Run git in `dir`, returning its output whatever the exit status.
///
/// # Errors
///
/// Returns `Error::Vcs` if git cannot be spawned.
fn git(dir: &Path, args: &[&str]) -> Result<Output, Error> {
    return Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| {
            return Error::Vcs {
                command: args.join(" "),
                reason: e.to_string(),
            };
        });
}

/// Run git in `dir` and return stdout, failing on a non-zero exit.
///
/// # Errors
///
/// Returns `Error::Vcs` carrying git's stderr.
fn git_stdout(dir: &Path, args: &[&str]) -> Result<Vec<u8>, Error> {
    let output = git(dir, args)?;
    if !output.status.success() {
        return Err(Error::Vcs {
            command: args.join(" "),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    return Ok(output.stdout);
}

/// Offset of the last non-whitespace byte in `range`.
fn last_non_whitespace(bytes: &[u8], range: Range<usize>) -> Option<usize> {
    let start = range.start;
    let offset = bytes.get(range)?.iter().rposition(|b| return !b.is_ascii_whitespace())?;
    return Some(start.saturating_add(offset));
}

/// Byte offset where each line starts. Index 0 is line 1.
fn line_starts(content: &str) -> Vec<usize> {
    return std::iter::once(0)
        .chain(content.match_indices('\n').map(|(i, _)| return i.saturating_add(1)))
        .collect();
}

/// New-side ranges of every hunk header in a unified diff.
fn parse_hunks(pattern: &Regex, diff: &str) -> Vec<Hunk> {
    return diff
        .lines()
        .filter_map(|line| {
            let captures = pattern.captures(line)?;
            let start = captures.get(1)?.as_str().parse().ok()?;
            let count = match captures.get(2) {
                None => 1,
                Some(m) => m.as_str().parse().ok()?,
            };
            return Some(Hunk { count, start });
        })
        .collect();
}

/// Changes from `git diff --name-status -z`.
fn parse_name_status(output: &[u8]) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut fields = split_nul(output).into_iter();
    while let Some(status) = fields.next() {
        let Some(path) = fields.next() else {
            break;
        };
        let change = match status.chars().next() {
            Some('A') => Change {
                after: Some(PathBuf::from(path)),
                before: None,
            },
            Some('C' | 'R') => {
                let Some(target) = fields.next() else {
                    break;
                };
                Change {
                    after: Some(PathBuf::from(target)),
                    before: Some(PathBuf::from(path)),
                }
            },
            Some('D') => Change {
                after: None,
                before: Some(PathBuf::from(path)),
            },
            _ => Change {
                after: Some(PathBuf::from(&path)),
                before: Some(PathBuf::from(path)),
            },
        };
        changes.push(change);
    }
    return changes;
}

/// Non-deleted files from `git status --porcelain=v1 -z`.
///
/// Each entry is `XY path`. Renames and copies are followed by their
/// origin path as a separate field, which becomes the file's origin.
fn parse_porcelain_status(output: &[u8]) -> Vec<ChangedFile> {
    let mut files = Vec::new();
    let mut fields = split_nul(output).into_iter();
    while let Some(entry) = fields.next() {
        let (Some(code), Some(path)) = (entry.get(..2), entry.get(3..)) else {
            continue;
        };
        let origin = if code.contains(['C', 'R']) {
            fields.next().map(PathBuf::from)
        } else {
            None
        };
        if code.contains('D') {
            debug!(file = path, "skipping deletion");
            continue;
        }
        files.push(ChangedFile {
            origin,
            path: PathBuf::from(path),
        });
    }
    return files;
}

/// The region of `content` covered by `hunk`, trimmed of surrounding
/// whitespace. `None` when the hunk only touched whitespace.
///
/// A pure deletion becomes a [`RegionKind::Deleted`] region bracketed by the
/// nearest surviving non-whitespace bytes on either side. At either end of
/// the file the one surviving neighbour is used for both offsets.
fn region_for_hunk(file: &Path, content: &str, starts: &[usize], hunk: Hunk) -> Option<ChangeRegion> {
    let bytes = content.as_bytes();
    if hunk.count == 0 {
        let point = starts.get(hunk.start).copied().unwrap_or(content.len());
        let before = last_non_whitespace(bytes, 0..point);
        let after = first_non_whitespace(bytes, point..bytes.len());
        return Some(ChangeRegion {
            end: after.or(before)?,
            file: file.to_path_buf(),
            kind: RegionKind::Deleted,
            start: before.or(after)?,
        });
    }

    let first = starts.get(hunk.start.checked_sub(1)?).copied()?;
    let past_last = hunk.start.saturating_sub(1).saturating_add(hunk.count);
    let stop = starts.get(past_last).copied().unwrap_or(content.len());
    return Some(ChangeRegion {
        end: last_non_whitespace(bytes, first..stop)?,
        file: file.to_path_buf(),
        kind: RegionKind::Changed,
        start: first_non_whitespace(bytes, first..stop)?,
    });
}

/// Top level of the git repository containing `dir`.
///
/// # Errors
///
/// Returns `Error::Vcs` if `dir` is not inside a repository.
pub fn repository_root(dir: &Path) -> Result<PathBuf, Error> {
    let output = git_stdout(dir, &["rev-parse", "--show-toplevel"])?;
    return Ok(PathBuf::from(String::from_utf8_lossy(&output).trim()));
}

/// Non-empty NUL-separated fields.
fn split_nul(output: &[u8]) -> Vec<String> {
    return String::from_utf8_lossy(output)
        .split('\0')
        .filter(|field| return !field.is_empty())
        .map(str::to_string)
        .collect();
}

/// One region spanning all non-whitespace content, for files with no base.
fn whole_content(file: &Path, content: &str) -> Option<ChangeRegion> {
    let bytes = content.as_bytes();
    return Some(ChangeRegion {
        end: last_non_whitespace(bytes, 0..bytes.len())?,
        file: file.to_path_buf(),
        kind: RegionKind::Changed,
        start: first_non_whitespace(bytes, 0..bytes.len())?,
    });
}
