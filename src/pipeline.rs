//! Concurrent processing of every regular file under a root path
//!
//! One run moves through `Idle -> Discovering -> Distributing -> Draining ->
//! Done`. The calling thread walks the tree and feeds paths into an
//! unbounded channel while a fixed pool of scoped worker threads pulls from
//! it. A failure on one file is recorded and the run continues; only a
//! failing directory walk fails the run.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::{ClencError, ErrorCategory, ErrorKind, Result};
use crate::file_ops::{self, FileCrypter};
use crate::progress::{FileFailure, Progress};

/// Which transform a run applies to every file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
}

type Handler = fn(&FileCrypter, &Path) -> Result<()>;

impl Operation {
    fn handler(self) -> Handler {
        match self {
            Operation::Encrypt => FileCrypter::encrypt_file,
            Operation::Decrypt => FileCrypter::decrypt_file,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Discovering,
    Distributing,
    Draining,
    Done,
}

/// Outcome of a run whose directory walk succeeded.
#[derive(Debug)]
pub struct RunSummary {
    /// Regular files counted before processing started.
    pub total: u64,
    pub succeeded: u64,
    pub failures: Vec<FileFailure>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Whether the run counts as successful. Per-file failures only count
    /// against it when `fail_on_file_errors` is set.
    pub fn is_success(&self, fail_on_file_errors: bool) -> bool {
        !fail_on_file_errors || self.failures.is_empty()
    }
}

pub struct Pipeline<'a> {
    crypter: &'a FileCrypter,
    workers: NonZeroUsize,
    show_progress: bool,
    stage: Stage,
}

impl<'a> Pipeline<'a> {
    pub fn new(crypter: &'a FileCrypter, config: &Config) -> Self {
        Self {
            crypter,
            workers: config.workers,
            show_progress: config.show_progress,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Apply `operation` to every regular file under `root`.
    ///
    /// `root` may also be a single regular file. A symbolic link given as
    /// `root` is resolved first; links below it are neither followed nor
    /// processed.
    pub fn run(&mut self, root: &Path, operation: Operation) -> Result<RunSummary> {
        let started = Instant::now();

        self.enter(Stage::Discovering);
        let (resolved, total) = match discover(root) {
            Ok(found) => found,
            Err(e) => {
                self.enter(Stage::Done);
                return Err(e);
            }
        };
        let root = resolved.as_path();
        info!(total, root = %root.display(), "discovered files");

        let progress = Progress::new(total, self.show_progress);
        let handler = operation.handler();
        let crypter = self.crypter;
        let workers = self.workers.get();

        self.enter(Stage::Distributing);
        let (sender, receiver) = crossbeam_channel::unbounded::<PathBuf>();
        let walk_result = thread::scope(|scope| {
            for _ in 0..workers {
                let receiver = receiver.clone();
                let progress = &progress;
                scope.spawn(move || {
                    for path in receiver {
                        match handler(crypter, &path) {
                            Ok(()) => progress.record_success(&path),
                            Err(e) => progress.record_failure(&path, e),
                        }
                    }
                });
            }
            drop(receiver);

            let result = feed(root, &sender);
            // Closing the channel lets the workers drain and exit.
            drop(sender);
            self.enter(Stage::Draining);
            result
        });

        let (succeeded, failures) = progress.finish();
        self.enter(Stage::Done);
        walk_result?;

        Ok(RunSummary {
            total,
            succeeded,
            failures,
            elapsed: started.elapsed(),
        })
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = ?self.stage, to = ?stage, "pipeline stage");
        self.stage = stage;
    }
}

fn discover(root: &Path) -> Result<(PathBuf, u64)> {
    let root = resolve_root(root)?;
    let total = count_files(&root)?;
    Ok((root, total))
}

/// If `root` is a symbolic link, return the canonical path of its target so
/// the files behind it are rewritten and the link itself is left alone.
fn resolve_root(root: &Path) -> Result<PathBuf> {
    match fs::symlink_metadata(root) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            let resolved = fs::canonicalize(root).map_err(|e| {
                ClencError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Discovery,
                    format!("failed to resolve {}", root.display()),
                    e,
                )
            })?;
            warn!(
                link = %root.display(),
                target = %resolved.display(),
                "target is a symbolic link, processing what it points to"
            );
            Ok(resolved)
        }
        // A missing root is reported by the walk itself.
        _ => Ok(root.to_path_buf()),
    }
}

/// Walk `root`, leaving out our own temporary files. Workers create those
/// next to the files they rewrite while the walk is still running.
fn walk(root: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !file_ops::is_temp_file_name(entry.file_name())
        })
}

/// Count the regular files under `root`.
pub fn count_files(root: &Path) -> Result<u64> {
    let mut count = 0;
    for entry in walk(root) {
        let entry = entry.map_err(discovery_error)?;
        if entry.file_type().is_file() {
            count += 1;
        }
    }
    Ok(count)
}

fn feed(root: &Path, sender: &Sender<PathBuf>) -> Result<()> {
    for entry in walk(root) {
        let entry = entry.map_err(discovery_error)?;
        if !entry.file_type().is_file() {
            continue;
        }
        sender.send(entry.into_path()).map_err(|_| {
            ClencError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "all workers exited before the walk finished",
            )
        })?;
    }
    Ok(())
}

fn discovery_error(err: walkdir::Error) -> ClencError {
    let msg = match err.path() {
        Some(path) => format!("failed to walk {}", path.display()),
        None => "failed to walk directory tree".to_string(),
    };
    ClencError::with_kind_and_source(ErrorCategory::User, ErrorKind::Discovery, msg, err)
}
