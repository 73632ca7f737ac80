//! Test selection for one request: an explicit position or a scan of
//! changed code.
//!
//! Recoverable failures (a stale change list, a file that cannot be read or
//! parsed, an index that cannot answer) never escape the task. They are
//! logged where they happen and contribute nothing to the result.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::changes::{ChangeListProvider, ChangeRangeResolver, ChangeSetCollector, ChangedFile};
use crate::codec;
use crate::config::Config;
use crate::error::Error;
use crate::index::IndexGateway;
use crate::method_resolver::find_enclosing_methods;
use crate::sink::PatternSink;
use crate::source_model::Workspace;
use crate::types::{IndexQueryResult, MethodDecl, PatternSet};

/// Shared cancellation signal. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    /// Set once cancellation is requested.
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Request cancellation. Work already finished is kept; no new file is
    /// picked up.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        return self.cancelled.load(Ordering::SeqCst);
    }
}

/// Collaborators a task reads from. Borrowed for the task's lifetime.
pub struct Collaborators<'a> {
    /// Source of change lists.
    pub changes: &'a dyn ChangeListProvider,
    /// Scan filters and worker count.
    pub config: &'a Config,
    /// Reverse index queries.
    pub gateway: IndexGateway<'a>,
    /// Changed regions per file.
    pub ranges: &'a dyn ChangeRangeResolver,
    /// Where changed files are read from.
    pub workspace: &'a Workspace,
}

/// One resolution task. Consumed by [`ImpactResolutionTask::run`].
pub struct ImpactResolutionTask<'a> {
    /// Cancellation signal shared with the caller.
    cancel: CancelFlag,
    /// What the task reads from.
    collaborators: Collaborators<'a>,
    /// Worker pool for scans; `None` scans on the calling thread.
    pool: Option<ThreadPool>,
    /// What to resolve.
    request: Request,
}

/// What a task resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// An explicit test position such as `com,Foo,bar`.
    Position(String),
    /// Changed code, optionally limited to one named change list.
    Scan {
        /// Change list to restrict the scan to; `None` scans all pending changes.
        change_list: Option<String>,
    },
}

impl<'a> ImpactResolutionTask<'a> {
    /// Changed methods in scan mode, paired with their file, in file order.
    /// Position requests have no changed methods.
    pub fn changed_methods(&self) -> Vec<(PathBuf, MethodDecl)> {
        let Request::Scan { change_list } = &self.request else {
            return Vec::new();
        };
        let files = self.files_to_scan(change_list.as_deref());
        let per_file = self.for_each_file(&files, |file| return self.methods_in_file(file));
        return files
            .into_iter()
            .zip(per_file)
            .flat_map(|(file, methods)| {
                return methods.into_iter().map(move |m| return (file.path.clone(), m));
            })
            .collect();
    }

    /// Files the scan should visit: the collector's list, filtered by config.
    fn files_to_scan(&self, change_list: Option<&str>) -> Vec<ChangedFile> {
        let collector =
            ChangeSetCollector::new(self.collaborators.changes, self.collaborators.workspace);
        return collector
            .affected_files(change_list)
            .into_iter()
            .filter(|file| {
                let scan = self.collaborators.config.should_scan(&file.path.to_string_lossy());
                if !scan {
                    debug!(file = %file.path.display(), "excluded by config");
                }
                return scan;
            })
            .collect();
    }

    /// Apply `work` to every file, on the pool if there is one. Results
    /// stay in file order whatever the worker count.
    fn for_each_file<R, F>(&self, files: &[ChangedFile], work: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&ChangedFile) -> R + Sync,
    {
        let visit = |file: &ChangedFile| {
            if self.cancel.is_cancelled() {
                return None;
            }
            return Some(work(file));
        };
        let results: Vec<Option<R>> = match &self.pool {
            None => files.iter().map(visit).collect(),
            Some(pool) => pool.install(|| return files.par_iter().map(visit).collect()),
        };
        return results.into_iter().flatten().collect();
    }

    /// Distinct methods touched by the changed regions of one file.
    fn methods_in_file(&self, changed: &ChangedFile) -> Vec<MethodDecl> {
        let file = changed.path.as_path();
        let session = match self.collaborators.workspace.read_session(file) {
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping unreadable file");
                return Vec::new();
            },
            Ok(s) => s,
        };

        let regions = match self.collaborators.ranges.changed_ranges(changed, session.source()) {
            Err(e @ Error::FileTooLarge { .. }) => {
                warn!(error = %e, "skipping file");
                return Vec::new();
            },
            Err(e) => {
                warn!(file = %file.display(), error = %e, "could not compute changed regions");
                return Vec::new();
            },
            Ok(regions) => regions,
        };
        if regions.is_empty() {
            debug!(file = %file.display(), "no changed regions");
            return Vec::new();
        }

        let parsed = match session.parse() {
            Err(e) => {
                debug!(file = %session.file().display(), error = %e, "skipping file without a method model");
                return Vec::new();
            },
            Ok(p) => p,
        };

        let mut methods: Vec<MethodDecl> = Vec::new();
        for region in &regions {
            let found = find_enclosing_methods(&parsed, region);
            if found.is_empty() {
                debug!(file = %file.display(), start = region.start, end = region.end, "region touches no method");
            }
            for method in found {
                if !methods.contains(&method) {
                    methods.push(method);
                }
            }
        }
        return methods;
    }

    /// Build a task. A worker pool is created when `config.jobs` exceeds one.
    ///
    /// # Errors
    ///
    /// Returns `Error::ThreadPool` if the worker pool cannot be created.
    pub fn new(
        request: Request,
        collaborators: Collaborators<'a>,
        cancel: CancelFlag,
    ) -> Result<Self, Error> {
        let jobs = collaborators.config.jobs;
        let pool = if jobs > 1 {
            Some(ThreadPoolBuilder::new().num_threads(jobs).build()?)
        } else {
            None
        };
        return Ok(Self {
            cancel,
            collaborators,
            pool,
            request,
        });
    }

    /// Decoded patterns for one file's changed methods, in method order.
    fn patterns_for_file(&self, file: &ChangedFile) -> Vec<String> {
        let mut patterns = Vec::new();
        for method in self.methods_in_file(file) {
            let Some(identifier) = method.identifier() else {
                debug!(file = %file.path.display(), method = %method.name, "method has no qualified class");
                continue;
            };
            let key = codec::qualify(&identifier.class, &identifier.method);
            if let IndexQueryResult::Found(raw) = self.collaborators.gateway.lookup(&key) {
                patterns.extend(raw.iter().map(|r| return codec::decode(r)));
            }
        }
        return patterns;
    }

    /// Resolve an explicit position with a single index lookup.
    fn position(&self, position: &str) -> PatternSet {
        let mut set = PatternSet::default();
        if self.cancel.is_cancelled() {
            return set;
        }
        let key = codec::normalize_position(position);
        if let IndexQueryResult::Found(raw) = self.collaborators.gateway.lookup(&key) {
            set.extend(raw.iter().map(|r| return codec::decode(r)));
        }
        return set;
    }

    /// Resolve the request to a pattern set. Never fails; a cancelled task
    /// returns whatever it finished before noticing.
    pub fn resolve(&self) -> PatternSet {
        let set = match &self.request {
            Request::Position(position) => self.position(position),
            Request::Scan { change_list } => self.scan(change_list.as_deref()),
        };
        if set.is_empty() {
            debug!("no tests affected");
        }
        info!(patterns = set.len(), "resolution finished");
        return set;
    }

    /// Resolve and hand the result to `sink`, exactly once.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` without delivering if the task was
    /// cancelled, or the sink's error if delivery fails.
    pub fn run(self, sink: &mut dyn PatternSink) -> Result<PatternSet, Error> {
        let patterns = self.resolve();
        if self.cancel.is_cancelled() {
            info!("resolution cancelled before delivery");
            return Err(Error::Cancelled);
        }
        sink.deliver(&patterns)?;
        return Ok(patterns);
    }

    /// Union the patterns of every changed method across the changed files.
    fn scan(&self, change_list: Option<&str>) -> PatternSet {
        let files = self.files_to_scan(change_list);
        info!(files = files.len(), ?change_list, "scanning changed files");

        let mut set = PatternSet::default();
        for patterns in self.for_each_file(&files, |file| return self.patterns_for_file(file)) {
            set.extend(patterns);
        }
        return set;
    }
}
