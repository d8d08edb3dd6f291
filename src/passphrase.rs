//! Where the password comes from
//!
//! The terminal prompt is the default. `--password-stdin` switches to
//! reading raw bytes until EOF, which is also what the tests use.

use crate::error::{ClencError, ErrorCategory, ErrorKind, Result};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// A source of password bytes, not necessarily UTF-8.
pub trait PasswordSource {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Takes every byte of `R` as the password, trailing newline included.
pub struct StreamPassword<R> {
    input: R,
}

impl<R: Read> StreamPassword<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: Read> PasswordSource for StreamPassword<R> {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut password = Zeroizing::new(Vec::new());
        self.input
            .read_to_end(&mut password)
            .map_err(|e| io_error("error reading password", e))?;
        Ok(password)
    }
}

/// Prompts on stderr and reads a line from the terminal without echo.
///
/// rpassword only hands back UTF-8, so other byte sequences need
/// `--password-stdin`.
pub struct TerminalPrompt;

impl PasswordSource for TerminalPrompt {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(ClencError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "stdin is not a terminal (use --password-stdin)",
            ));
        }

        let mut stderr = io::stderr().lock();
        stderr
            .write_all(b"Enter password: ")
            .and_then(|()| stderr.flush())
            .map_err(|e| io_error("failed to write prompt", e))?;
        drop(stderr);

        let line = rpassword::read_password().map_err(|e| {
            ClencError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("failure reading password: {}", e),
                e,
            )
        })?;
        Ok(Zeroizing::new(line.into_bytes()))
    }
}

/// Read a password and reject an empty one.
pub fn read_required(source: &mut dyn PasswordSource) -> Result<Zeroizing<Vec<u8>>> {
    let password = source.read_password()?;
    if password.is_empty() {
        return Err(ClencError::with_kind(
            ErrorCategory::User,
            ErrorKind::Usage,
            "No password given.",
        ));
    }
    Ok(password)
}

fn io_error(what: &str, err: io::Error) -> ClencError {
    ClencError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::Io,
        format!("{}: {}", what, err),
        err,
    )
}
