//! Shared progress state for one pipeline run

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::ClencError;

/// A file that could not be processed, and why.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: ClencError,
}

#[derive(Debug, Default)]
struct Counters {
    completed: u64,
    succeeded: u64,
    failures: Vec<FileFailure>,
}

/// Counters touched by every worker, plus the progress line they drive.
///
/// Recording an outcome and redrawing the line happen under one lock, so
/// output from concurrent workers never interleaves.
pub struct Progress {
    total: u64,
    bar: ProgressBar,
    counters: Mutex<Counters>,
}

impl Progress {
    pub fn new(total: u64, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template("Processing ({pos}/{len}): {wide_msg}")
            {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            total,
            bar,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Files finished so far, successful or not.
    pub fn completed(&self) -> u64 {
        self.counters.lock().completed
    }

    pub fn record_success(&self, path: &Path) {
        let mut counters = self.counters.lock();
        counters.completed += 1;
        counters.succeeded += 1;
        debug!(path = %path.display(), "processed");
        self.bar.set_message(path.display().to_string());
        self.bar.set_position(counters.completed);
    }

    pub fn record_failure(&self, path: &Path, error: ClencError) {
        let mut counters = self.counters.lock();
        counters.completed += 1;
        self.bar.suspend(|| {
            warn!(path = %path.display(), "failed to process: {}", error.chain());
        });
        self.bar.set_position(counters.completed);
        counters.failures.push(FileFailure {
            path: path.to_path_buf(),
            error,
        });
    }

    /// Clear the progress line and hand back the successes and failures.
    pub fn finish(self) -> (u64, Vec<FileFailure>) {
        self.bar.finish_and_clear();
        let counters = self.counters.into_inner();
        (counters.succeeded, counters.failures)
    }
}
