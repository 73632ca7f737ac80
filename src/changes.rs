//! Collect the files a resolution should scan.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::Error;
use crate::source_model::Workspace;
use crate::types::ChangeRegion;

/// One file-level change inside a change list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Path after the change; `None` for deletions.
    pub after: Option<PathBuf>,
    /// Path before the change; `None` for additions.
    pub before: Option<PathBuf>,
}

/// A named group of changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeList {
    /// Changes in provider order.
    pub changes: Vec<Change>,
    /// Name the list was found under.
    pub name: String,
}

/// Source of pending modifications, typically a version-control system.
pub trait ChangeListProvider: Send + Sync {
    /// Every file with a pending modification, in provider order.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be queried.
    fn all_affected_files(&self) -> Result<Vec<ChangedFile>, Error>;

    /// The change list called `name`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be queried.
    fn find_by_name(&self, name: &str) -> Result<Option<ChangeList>, Error>;
}

/// Computes the changed regions of one file's current content.
pub trait ChangeRangeResolver: Send + Sync {
    /// Changed regions of `current`, the snapshot content of `file`, in
    /// file order. Empty for an unchanged file, including one that was only
    /// moved from its origin.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileTooLarge` when the file cannot be diffed, which
    /// callers treat as "skip this file", or a VCS error.
    fn changed_ranges(&self, file: &ChangedFile, current: &str) -> Result<Vec<ChangeRegion>, Error>;
}

/// Resolves a change-list request to the ordered files to scan.
pub struct ChangeSetCollector<'a> {
    /// Where changes come from.
    provider: &'a dyn ChangeListProvider,
    /// Used to check that an after-path is still a live file.
    workspace: &'a Workspace,
}

impl<'a> ChangeSetCollector<'a> {
    /// Files to scan for `change_list`, or for all pending changes if `None`.
    ///
    /// A name with no matching change list, or a provider failure, yields an
    /// empty list. Deletions and after-paths that are not live files are
    /// skipped. A before-path that differs from the after-path is kept as
    /// the file's origin.
    pub fn affected_files(&self, change_list: Option<&str>) -> Vec<ChangedFile> {
        let Some(name) = change_list else {
            return self.provider.all_affected_files().unwrap_or_else(|e| {
                warn!(error = %e, "could not list affected files");
                return Vec::new();
            });
        };

        let list = match self.provider.find_by_name(name) {
            Err(e) => {
                warn!(change_list = name, error = %e, "could not read change list");
                return Vec::new();
            },
            Ok(None) => {
                debug!(change_list = name, "no such change list");
                return Vec::new();
            },
            Ok(Some(list)) => list,
        };

        return list
            .changes
            .into_iter()
            .filter_map(|change| {
                let Some(path) = change.after else {
                    debug!(file = ?change.before, "skipping deletion");
                    return None;
                };
                let origin = change.before.filter(|before| return *before != path);
                return Some(ChangedFile { origin, path });
            })
            .filter(|file| {
                let live = self.workspace.is_live(&file.path);
                if !live {
                    debug!(file = %file.path.display(), "skipping change without a live file");
                }
                return live;
            })
            .collect();
    }

    /// Collect from `provider`, checking liveness against `workspace`.
    pub fn new(provider: &'a dyn ChangeListProvider, workspace: &'a Workspace) -> Self {
        return Self { provider, workspace };
    }
}

/// A live file to scan, with the path its base content is found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    /// Path at the base revision when it differs from `path`, as for a
    /// rename or copy.
    pub origin: Option<PathBuf>,
    /// Current path, relative to the workspace root.
    pub path: PathBuf,
}
