//! clenc - in-place password-based encryption of files and directory trees
//!
//! Every file is encrypted on its own with a key derived by Argon2id from the
//! password and a per-file salt, sealed with AES-256-GCM, and stored in a
//! self-describing envelope so that decryption needs nothing but the
//! password.

#![forbid(unsafe_code)]

pub mod config;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod passphrase;
pub mod pipeline;
pub mod progress;
pub mod secretcrypt;
