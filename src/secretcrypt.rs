//! Encryption/decryption using Argon2id + AES-256-GCM
//!
//! This module implements password-based encryption using:
//! - Argon2id for key derivation from password
//! - AES-256-GCM for authenticated encryption
//!
//! The cipher output is `nonce || ciphertext || tag`, which the envelope
//! layer prefixes with its identifier and the salt.

use std::num::NonZeroU8;
use std::thread;

use aes_gcm::aead::generic_array::typenum::Unsigned;
use aes_gcm::aead::{Aead, AeadCore, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::envelope::{self, SALT_LEN};
use crate::error::{ClencError, ErrorCategory, ErrorKind, Result};

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Argon2id time cost (iterations)
const ARGON2_T_COST: u32 = 3;

/// Argon2id memory cost in KiB (64 MiB)
const ARGON2_M_COST_KIB: u32 = 64 * 1024;

/// Argon2id cost parameters.
///
/// Parallelism is part of the derivation: a file can only be decrypted with
/// the same `lanes` value it was encrypted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub mem_cost_kib: u32,
    /// Time cost / iterations
    pub time_cost: u32,
    /// Degree of parallelism
    pub lanes: NonZeroU8,
}

impl KdfParams {
    /// Default costs with an explicit degree of parallelism.
    pub fn with_lanes(lanes: NonZeroU8) -> Self {
        Self {
            mem_cost_kib: ARGON2_M_COST_KIB,
            time_cost: ARGON2_T_COST,
            lanes,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::with_lanes(default_lanes())
    }
}

/// Host parallelism, clamped into the range of an Argon2 lane count.
pub fn default_lanes() -> NonZeroU8 {
    let cores = thread::available_parallelism().map_or(1, |n| n.get());
    let clamped = u8::try_from(cores).unwrap_or(u8::MAX);
    NonZeroU8::new(clamped).unwrap_or(NonZeroU8::MIN)
}

/// Nonce length required by the AEAD, in bytes.
pub fn nonce_size() -> usize {
    <Aes256Gcm as AeadCore>::NonceSize::USIZE
}

/// Derive a 32-byte key from a password and salt using Argon2id
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        u32::from(params.lanes.get()),
        Some(KEY_LEN),
    )
    .map_err(|e| {
        ClencError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::KdfFailure,
            format!("invalid Argon2id params: {e}"),
        )
    })?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password, salt, &mut *key)
        .map_err(|e| {
            ClencError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::KdfFailure,
                format!("Argon2id key derivation failed: {e}"),
            )
        })?;

    Ok(key)
}

/// Build the AEAD instance for a derived key.
pub fn new_aead(key: &[u8; KEY_LEN]) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
}

/// Seal `plaintext` under `nonce`, returning `nonce || ciphertext || tag`.
pub fn seal(cipher: &Aes256Gcm, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != nonce_size() {
        return Err(ClencError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            format!("nonce must be {} bytes, got {}", nonce_size(), nonce.len()),
        ));
    }

    let sealed = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| {
            ClencError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::CipherFailure,
                format!("encryption failed: {e}"),
            )
        })?;

    let mut output = Vec::with_capacity(nonce.len() + sealed.len());
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed);
    Ok(output)
}

/// Authenticate and decrypt `ciphertext` (which includes the trailing tag).
///
/// A wrong password and tampered data produce the same error.
pub fn open(cipher: &Aes256Gcm, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != nonce_size() {
        return Err(ClencError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            format!("nonce must be {} bytes, got {}", nonce_size(), nonce.len()),
        ));
    }

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| authentication_failed())
}

/// Encrypt plaintext with a password using random salt and nonce
///
/// Returns the complete envelope.
pub fn encrypt(password: &[u8], plaintext: &[u8], params: &KdfParams) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut nonce = vec![0u8; nonce_size()];
    OsRng.fill_bytes(&mut nonce);

    encrypt_deterministic(password, plaintext, &salt, &nonce, params)
}

/// Encrypt plaintext with a password using provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/nonce.
pub fn encrypt_deterministic(
    password: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8],
    params: &KdfParams,
) -> Result<Vec<u8>> {
    let key = derive_key(password, salt, params)?;
    let cipher = new_aead(&key);
    let sealed = seal(&cipher, nonce, plaintext)?;
    Ok(envelope::wrap(salt, &sealed))
}

/// Decrypt a complete envelope with a password
pub fn decrypt(password: &[u8], data: &[u8], params: &KdfParams) -> Result<Vec<u8>> {
    let (salt, rest) = envelope::unwrap(data)?;

    // Checked before key derivation so truncated input fails fast.
    if rest.len() < nonce_size() {
        return Err(ClencError::with_kind(
            ErrorCategory::User,
            ErrorKind::TruncatedEnvelope,
            "file too short to be encrypted",
        ));
    }

    let key = derive_key(password, &salt, params)?;
    let cipher = new_aead(&key);
    let (nonce, ciphertext) = rest.split_at(nonce_size());
    open(&cipher, nonce, ciphertext)
}

fn authentication_failed() -> ClencError {
    ClencError::with_kind(
        ErrorCategory::User,
        ErrorKind::AuthenticationFailed,
        "corrupt input, tampered-with data, or bad password",
    )
}

#[cfg(test)]
pub(crate) fn fast_params() -> KdfParams {
    KdfParams {
        mem_cost_kib: 1024,
        time_cost: 1,
        lanes: NonZeroU8::MIN,
    }
}
