//! clenc CLI - in-place password-based file encryption
//!
//! Command-line interface for encrypting and decrypting every file under a
//! target path using AES-256-GCM with Argon2id key derivation.

use clap::{Parser, ValueEnum};
use std::num::{NonZeroU8, NonZeroUsize};
use std::path::PathBuf;
use std::process;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

use clenc::config::{Config, default_workers};
use clenc::error::Result;
use clenc::file_ops::FileCrypter;
use clenc::passphrase::{self, PasswordSource, StreamPassword, TerminalPrompt};
use clenc::pipeline::{Operation, Pipeline};
use clenc::secretcrypt::{KdfParams, default_lanes};

#[derive(Parser)]
#[command(name = "clenc")]
#[command(version)]
#[command(about = "Encrypt or decrypt files in place with a password.", long_about = None)]
struct Cli {
    /// Target file or directory to encrypt/decrypt
    #[arg(short, long, value_name = "PATH")]
    target: PathBuf,

    /// Operation mode
    #[arg(short, long, value_enum)]
    mode: Mode,

    /// Number of files processed concurrently
    #[arg(short, long, default_value_t = default_workers())]
    workers: NonZeroUsize,

    /// Argon2id parallelism used for key derivation. Files must be
    /// decrypted with the value they were encrypted with.
    #[arg(long, default_value_t = default_lanes())]
    kdf_lanes: NonZeroU8,

    /// Encrypt files even if they are already encrypted
    #[arg(short, long)]
    force: bool,

    /// Exit with a failure status if any single file failed
    #[arg(long)]
    strict: bool,

    /// Read password from stdin instead of from terminal
    #[arg(long)]
    password_stdin: bool,

    /// Do not draw the progress line
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Encrypt,
    Decrypt,
}

impl From<Mode> for Operation {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Encrypt => Operation::Encrypt,
            Mode::Decrypt => Operation::Decrypt,
        }
    }
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            workers: self.workers,
            kdf: KdfParams::with_lanes(self.kdf_lanes),
            force: self.force,
            fail_on_file_errors: self.strict,
            show_progress: !self.quiet,
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e.chain());
            process::exit(1);
        }
    }
}

/// Returns whether the run succeeded under the configured exit policy.
fn run(cli: &Cli) -> Result<bool> {
    let config = cli.config();
    let mut source = password_source(cli.password_stdin);
    let password = passphrase::read_required(&mut *source)?;

    let crypter = FileCrypter::new(password, &config);
    let summary = Pipeline::new(&crypter, &config).run(&cli.target, cli.mode.into())?;

    info!(
        "processed {} of {} files, {} failed",
        summary.succeeded,
        summary.total,
        summary.failures.len()
    );
    info!("Elapsed time: {:?}", summary.elapsed);
    Ok(summary.is_success(config.fail_on_file_errors))
}

fn password_source(use_stdin: bool) -> Box<dyn PasswordSource> {
    if use_stdin {
        Box::new(StreamPassword::new(std::io::stdin()))
    } else {
        Box::new(TerminalPrompt)
    }
}
