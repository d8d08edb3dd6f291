//! In-place file encryption/decryption
//!
//! Both operations read the whole file, transform it in memory and replace
//! the original through a temporary file in the same directory
//! (tempfile + fsync + rename), so a failure at any step leaves the original
//! content untouched. Permission bits and timestamps are carried over.

use crate::config::Config;
use crate::envelope;
use crate::error::{ClencError, ErrorCategory, ErrorKind, Result};
use crate::secretcrypt::{self, KdfParams};
use filetime::FileTime;
use std::ffi::OsStr;
use std::fs::{self, File, Permissions};
use std::io::{self, Read, Write};
use std::path::Path;
use zeroize::Zeroizing;

/// Name prefix of the temporary files written next to the file being
/// replaced. Directory walks must skip these.
pub const TEMP_PREFIX: &str = ".clenc-";

/// Whether `name` belongs to a temporary file created by `replace_contents`.
pub fn is_temp_file_name(name: &OsStr) -> bool {
    name.as_encoded_bytes().starts_with(TEMP_PREFIX.as_bytes())
}

/// Applies encryption or decryption to individual files with one password.
///
/// Shared by reference between pipeline workers; every call derives its own
/// key and cipher.
pub struct FileCrypter {
    password: Zeroizing<Vec<u8>>,
    kdf: KdfParams,
    force: bool,
}

impl FileCrypter {
    pub fn new(password: Zeroizing<Vec<u8>>, config: &Config) -> Self {
        Self {
            password,
            kdf: config.kdf,
            force: config.force,
        }
    }

    /// Encrypt a buffer into a complete envelope.
    ///
    /// Refuses input that already carries the envelope identifier unless
    /// `force` is set.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if envelope::is_encrypted(plaintext) && !self.force {
            return Err(ClencError::with_kind(
                ErrorCategory::User,
                ErrorKind::AlreadyEncrypted,
                "file already encrypted (use --force to encrypt it again)",
            ));
        }
        secretcrypt::encrypt(&self.password, plaintext, &self.kdf)
    }

    /// Decrypt a complete envelope.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        secretcrypt::decrypt(&self.password, data, &self.kdf)
    }

    /// Encrypt the file at `path` in place.
    pub fn encrypt_file(&self, path: &Path) -> Result<()> {
        let (plaintext, snapshot) = read_with_metadata(path)?;
        let encrypted = self
            .encrypt(&plaintext)
            .map_err(|e| e.with_context(format!("failed to encrypt {}", path.display())))?;
        replace_contents(path, &encrypted, &snapshot)
    }

    /// Decrypt the file at `path` in place.
    pub fn decrypt_file(&self, path: &Path) -> Result<()> {
        let (data, snapshot) = read_with_metadata(path)?;
        let plaintext = self
            .decrypt(&data)
            .map_err(|e| e.with_context(format!("failed to decrypt {}", path.display())))?;
        replace_contents(path, &plaintext, &snapshot)
    }
}

/// Permission bits and timestamps captured before a file is rewritten.
#[derive(Debug, Clone)]
pub struct MetadataSnapshot {
    pub permissions: Permissions,
    pub modified: FileTime,
    pub accessed: FileTime,
}

impl MetadataSnapshot {
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        Self {
            permissions: metadata.permissions(),
            modified: FileTime::from_last_modification_time(metadata),
            accessed: FileTime::from_last_access_time(metadata),
        }
    }
}

/// Read a file's full content together with its metadata.
pub fn read_with_metadata(path: &Path) -> Result<(Vec<u8>, MetadataSnapshot)> {
    let mut file = File::open(path).map_err(|e| read_error(path, e))?;
    let metadata = file.metadata().map_err(|e| read_error(path, e))?;
    let mut content = Vec::with_capacity(usize::try_from(metadata.len()).unwrap_or(0));
    file.read_to_end(&mut content)
        .map_err(|e| read_error(path, e))?;
    Ok((content, MetadataSnapshot::from_metadata(&metadata)))
}

/// Atomically replace the content of `path`, then restore `snapshot`.
pub fn replace_contents(path: &Path, contents: &[u8], snapshot: &MetadataSnapshot) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| write_error("failed to create tempfile", e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| write_error("failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| write_error("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| write_error("failed to sync file prior to rename", e))?;
    temp_file
        .as_file()
        .set_permissions(snapshot.permissions.clone())
        .map_err(|e| write_error("failed to set tempfile permissions", e))?;

    temp_file.persist(path).map_err(|e| {
        write_error(
            format!("failed to rename to target file {}", path.display()),
            e.error,
        )
    })?;

    filetime::set_file_times(path, snapshot.accessed, snapshot.modified).map_err(|e| {
        write_error(
            format!("failed to restore timestamps of {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> ClencError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    ClencError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}

fn write_error(msg: impl Into<String>, err: io::Error) -> ClencError {
    ClencError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, err)
}
