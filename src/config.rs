//! Run configuration
//!
//! Built once by the binary from the command line and passed down
//! explicitly. Nothing here is read from the environment.

use std::num::NonZeroUsize;
use std::thread;

use crate::secretcrypt::KdfParams;

#[derive(Debug, Clone)]
pub struct Config {
    /// Number of concurrent file workers.
    pub workers: NonZeroUsize,
    /// Argon2id costs. `kdf.lanes` is independent of `workers`.
    pub kdf: KdfParams,
    /// Re-encrypt files that already carry the envelope identifier.
    pub force: bool,
    /// Treat any per-file failure as a failed run.
    pub fail_on_file_errors: bool,
    /// Draw the progress bar on stderr.
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            kdf: KdfParams::default(),
            force: false,
            fail_on_file_errors: false,
            show_progress: true,
        }
    }
}

/// Host parallelism, or one worker if it cannot be determined.
pub fn default_workers() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}
