//! File watcher: runs `select` on startup, then re-runs on source changes.
//!
//! Each selection runs on its own thread. A change that arrives while a
//! selection is still resolving cancels it, so only the newest one prints.

use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};
use tracing::info;

use crate::commands::{self, Options, Selection};
use crate::diagnostics;
use crate::error::Error;
use crate::task::CancelFlag;
use crate::vcs;

/// Debounce delay between filesystem events and re-selection.
const DEBOUNCE_MS: u64 = 100;

/// A selection running in the background.
struct Running {
    /// Cancels the selection.
    cancel: CancelFlag,
    /// The selection thread.
    handle: JoinHandle<Result<(), Error>>,
}

/// Create a filesystem watcher that sends events on the given channel.
/// Changes inside `.git` are ignored; git touches them while we query it.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be created.
fn create_watcher(tx: crossbeam_channel::Sender<()>) -> Result<notify::RecommendedWatcher, Error> {
    return notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_)
                    | notify::EventKind::Modify(_)
                    | notify::EventKind::Remove(_)
            )
            && event.paths.iter().any(|p| return !is_git_internal(p))
        {
            let _ = tx.send(());
        }
    })
    .map_err(|e| {
        return Error::Watch {
            reason: format!("watcher setup failed: {e}"),
        };
    });
}

/// Wait for a selection and report how it ended.
fn finish(running: Running) {
    match running.handle.join() {
        Err(_) => eprintln!("watch: selection thread panicked"),
        Ok(Err(Error::Cancelled)) => info!("selection superseded by a newer change"),
        Ok(Err(e)) => diagnostics::print_error(&e),
        Ok(Ok(())) => {},
    }
}

/// Whether `path` lies inside a `.git` directory.
fn is_git_internal(path: &Path) -> bool {
    return path
        .components()
        .any(|c| return matches!(c, Component::Normal(name) if name == ".git"));
}

/// Entry point for the watch command.
///
/// Selects once, then watches the workspace and selects again on changes.
///
/// # Errors
///
/// Returns `Error::Watch` if the workspace cannot be watched.
pub fn run(options: &Options, selection: &Selection) -> Result<ExitCode, Error> {
    let root = vcs::repository_root(Path::new(".")).unwrap_or_else(|_| return PathBuf::from("."));

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;
    watcher.watch(&root, RecursiveMode::Recursive).map_err(|e| {
        return Error::Watch {
            reason: format!("cannot watch {}: {e}", root.display()),
        };
    })?;

    eprintln!("watch: initial selection");
    let mut running = spawn_selection(options, selection);
    eprintln!("watch: monitoring {}, press Ctrl+C to stop", root.display());

    while rx.recv().is_ok() {
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        while rx.recv_timeout(debounce).is_ok() {}
        running.cancel.cancel();
        finish(running);
        eprintln!("watch: change detected, re-selecting...");
        running = spawn_selection(options, selection);
    }

    finish(running);
    return Ok(ExitCode::SUCCESS);
}

/// Start a selection on a background thread.
fn spawn_selection(options: &Options, selection: &Selection) -> Running {
    let cancel = CancelFlag::default();
    let flag = cancel.clone();
    let options = options.clone();
    let selection = selection.clone();
    let handle = thread::spawn(move || return commands::select(&options, &selection, flag));
    return Running { cancel, handle };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_internals_are_recognized() {
        assert!(is_git_internal(Path::new("/repo/.git/index")), "git index");
        assert!(is_git_internal(Path::new(".git/refs/heads/main")), "relative");
        assert!(!is_git_internal(Path::new("/repo/src/.gitignore")), "dotfile is not internal");
        assert!(!is_git_internal(Path::new("/repo/src/Foo.java")), "source file");
    }
}
