//! On-disk envelope layout
//!
//! An encrypted file is self-describing. The layout is:
//! - identifier: 9 bytes, ASCII `ENCRYTPED`
//! - salt: 16 bytes
//! - nonce: algorithm-defined (12 bytes for AES-256-GCM)
//! - ciphertext: variable length (includes the 16-byte GCM tag)
//!
//! The identifier is not authenticated. It only flags a file as already
//! encrypted, so plaintext that happens to start with those bytes is
//! indistinguishable from an envelope.

use crate::error::{ClencError, ErrorCategory, ErrorKind, Result};

/// Tag written at the start of every encrypted file.
///
/// The misspelling is part of the format; existing files depend on it.
pub const IDENTIFIER: &[u8] = b"ENCRYTPED";

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Whether `bytes` looks like an envelope produced with `identifier` and a
/// salt of `salt_len` bytes.
pub fn is_encrypted_with(bytes: &[u8], identifier: &[u8], salt_len: usize) -> bool {
    if bytes.len() < identifier.len() + salt_len {
        return false;
    }
    &bytes[..identifier.len()] == identifier
}

/// Whether `bytes` carries the clenc envelope tag.
pub fn is_encrypted(bytes: &[u8]) -> bool {
    is_encrypted_with(bytes, IDENTIFIER, SALT_LEN)
}

/// Build an envelope from a salt and the cipher output.
///
/// Format: identifier || salt || cipher_output, where `cipher_output` is
/// already `nonce || ciphertext-with-tag`.
pub fn wrap(salt: &[u8; SALT_LEN], cipher_output: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(IDENTIFIER.len() + SALT_LEN + cipher_output.len());
    out.extend_from_slice(IDENTIFIER);
    out.extend_from_slice(salt);
    out.extend_from_slice(cipher_output);
    out
}

/// Split an envelope into its salt and the remaining `nonce || ciphertext`
/// block. The identifier is checked and discarded.
pub fn unwrap(bytes: &[u8]) -> Result<([u8; SALT_LEN], &[u8])> {
    if !is_encrypted(bytes) {
        return Err(ClencError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotEncrypted,
            "file is not encrypted",
        ));
    }

    let (salt, rest) = bytes[IDENTIFIER.len()..].split_at(SALT_LEN);
    let salt: [u8; SALT_LEN] = salt.try_into().map_err(|_| {
        ClencError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "salt slice has unexpected length",
        )
    })?;
    Ok((salt, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_is_nine_ascii_bytes() {
        assert_eq!(IDENTIFIER.len(), 9);
        assert!(IDENTIFIER.is_ascii());
    }

    #[test]
    fn test_detects_tagged_content() {
        let content = b"ENCRYTPEDsalt123encrypted_data";
        assert!(is_encrypted_with(content, b"ENCRYTPED", 16));
        assert!(is_encrypted(content));
    }

    #[test]
    fn test_rejects_untagged_content() {
        assert!(!is_encrypted(b"random_data"));
        assert!(!is_encrypted(b""));
        assert!(!is_encrypted(b"encrytpedsalt123encrypted_data"));
    }

    #[test]
    fn test_rejects_identifier_without_full_salt() {
        // Identifier plus 15 bytes: one short of a salt.
        let mut content = IDENTIFIER.to_vec();
        content.extend_from_slice(&[0u8; SALT_LEN - 1]);
        assert!(!is_encrypted(&content));

        content.push(0);
        assert!(is_encrypted(&content));
    }

    #[test]
    fn test_wrap_layout() {
        let salt = [7u8; SALT_LEN];
        let body = b"nonce-and-ciphertext";
        let envelope = wrap(&salt, body);

        assert_eq!(envelope.len(), IDENTIFIER.len() + SALT_LEN + body.len());
        assert_eq!(&envelope[..9], b"ENCRYTPED");
        assert_eq!(&envelope[9..25], &salt);
        assert_eq!(&envelope[25..], body);
    }

    #[test]
    fn test_unwrap_splits_salt_and_rest() {
        let salt: [u8; SALT_LEN] = core::array::from_fn(|i| i as u8);
        let envelope = wrap(&salt, b"rest");

        let (got_salt, rest) = unwrap(&envelope).unwrap();
        assert_eq!(got_salt, salt);
        assert_eq!(rest, b"rest");
    }

    #[test]
    fn test_unwrap_empty_rest() {
        let envelope = wrap(&[1u8; SALT_LEN], b"");
        let (_, rest) = unwrap(&envelope).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn test_unwrap_plaintext_fails() {
        let err = unwrap(b"Hello, World! This is plaintext.").expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::NotEncrypted));
    }
}
