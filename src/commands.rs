//! CLI commands for testimpact: select, lookup, methods.

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::debug;

use crate::changes::ChangeRangeResolver;
use crate::codec;
use crate::config::Config;
use crate::error::Error;
use crate::index::{IndexFile, IndexGateway, TestDiscoveryIndex as _};
use crate::sink::{JsonSink, TextSink};
use crate::source_model::Workspace;
use crate::task::{CancelFlag, Collaborators, ImpactResolutionTask, Request};
use crate::vcs::{self, GitChangeLists, GitChangeRanges};

/// Revision scan mode diffs against when no change list is named.
const WORKING_TREE_BASE: &str = "HEAD";

/// What a command reads from, resolved once from the working directory.
struct Context {
    /// Loaded `.testimpact.toml`, with CLI overrides applied.
    config: Config,
    /// The reverse index, opened lazily.
    index: IndexFile,
    /// Change lists of the enclosing git repository.
    lists: GitChangeLists,
    /// Repository top level, or the current directory outside git.
    workspace: Workspace,
}

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Index path overriding the config.
    pub index: Option<PathBuf>,
    /// Worker count overriding the config.
    pub jobs: Option<usize>,
}

/// How selected patterns are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// `{"patterns": [...]}`.
    Json,
    /// One pattern per line.
    Text,
}

/// Arguments of one selection.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Restrict the scan to this change list (a git revision).
    pub change_list: Option<String>,
    /// Output format.
    pub format: OutputFormat,
    /// Select by explicit test position instead of scanning.
    pub position: Option<String>,
}

impl Context {
    /// Build the collaborators a task borrows.
    fn collaborators<'a>(&'a self, ranges: &'a dyn ChangeRangeResolver) -> Collaborators<'a> {
        return Collaborators {
            changes: &self.lists,
            config: &self.config,
            gateway: IndexGateway::new(&self.index),
            ranges,
            workspace: &self.workspace,
        };
    }

    /// Discover the workspace and load its config.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::TomlDe` if `.testimpact.toml` is unreadable.
    fn load(options: &Options) -> Result<Self, Error> {
        let cwd = PathBuf::from(".");
        let root = vcs::repository_root(&cwd).unwrap_or_else(|e| {
            debug!(error = %e, "not inside a git repository, using the current directory");
            return cwd;
        });

        let mut config = Config::load(&root)?;
        if let Some(jobs) = options.jobs {
            config.jobs = jobs.max(1);
        }
        let index_path = options.index.clone().unwrap_or_else(|| return root.join(&config.index));
        debug!(root = %root.display(), index = %index_path.display(), "workspace resolved");

        return Ok(Self {
            config,
            index: IndexFile::open(index_path),
            lists: GitChangeLists::new(root.clone()),
            workspace: Workspace::new(root),
        });
    }

    /// Range resolver diffing against the change list, or `HEAD` if none.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolver cannot be built.
    fn ranges(&self, change_list: Option<&str>) -> Result<GitChangeRanges, Error> {
        return GitChangeRanges::new(
            self.workspace.root().to_path_buf(),
            change_list.unwrap_or(WORKING_TREE_BASE),
            self.config.max_file_size,
        );
    }
}

/// Print the raw, undecoded index entry for `key`.
///
/// # Errors
///
/// Returns an error if the index cannot be read.
pub fn lookup(options: &Options, key: &str) -> Result<ExitCode, Error> {
    let context = Context::load(options)?;
    let Some(patterns) = context.index.query(key)? else {
        eprintln!("no index entry for `{key}`");
        return Ok(ExitCode::from(1));
    };

    let mut out = io::stdout().lock();
    for pattern in &patterns {
        writeln!(out, "{pattern}")?;
    }
    return Ok(ExitCode::SUCCESS);
}

/// List every changed method as `file: key`, where `key` is the index key
/// the method is looked up under.
///
/// # Errors
///
/// Returns an error if the workspace cannot be loaded or stdout fails.
pub fn methods(options: &Options, change_list: Option<&str>) -> Result<(), Error> {
    let context = Context::load(options)?;
    let ranges = context.ranges(change_list)?;
    let request = Request::Scan {
        change_list: change_list.map(str::to_string),
    };
    let task = ImpactResolutionTask::new(request, context.collaborators(&ranges), CancelFlag::default())?;

    let mut out = io::stdout().lock();
    for (file, method) in task.changed_methods() {
        match method.identifier() {
            None => writeln!(out, "{}: {} (no qualified class)", display(&file), method.name)?,
            Some(id) => writeln!(out, "{}: {}", display(&file), codec::qualify(&id.class, &id.method))?,
        }
    }
    return Ok(());
}

/// Run one resolution task and write its patterns to stdout.
///
/// # Errors
///
/// Returns `Error::Cancelled` if `cancel` fires first, or an error if the
/// workspace cannot be loaded or stdout fails.
pub fn select(options: &Options, selection: &Selection, cancel: CancelFlag) -> Result<(), Error> {
    let context = Context::load(options)?;
    let ranges = context.ranges(selection.change_list.as_deref())?;
    let request = match &selection.position {
        None => Request::Scan {
            change_list: selection.change_list.clone(),
        },
        Some(position) => Request::Position(position.clone()),
    };
    let task = ImpactResolutionTask::new(request, context.collaborators(&ranges), cancel)?;

    let stdout = io::stdout().lock();
    match selection.format {
        OutputFormat::Json => task.run(&mut JsonSink::new(stdout))?,
        OutputFormat::Text => task.run(&mut TextSink::new(stdout))?,
    };
    return Ok(());
}

/// Path text with `/` separators on every platform.
fn display(file: &Path) -> String {
    return file.to_string_lossy().replace('\\', "/");
}
