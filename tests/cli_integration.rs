//! CLI integration tests
//!
//! Tests the command-line interface end-to-end. These use the default
//! Argon2id costs, so every file takes a noticeable fraction of a second.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Get path to the clenc binary
fn clenc_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_clenc"))
}

/// Run clenc with password from stdin
fn run_clenc_with_password(args: &[&str], password: &str) -> Result<Output, std::io::Error> {
    let mut child = Command::new(clenc_bin())
        .arg("--password-stdin")
        .arg("--quiet")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g. a usage error)
        let _ = stdin.write_all(password.as_bytes());
    }

    child.wait_with_output()
}

fn run_mode(mode: &str, target: &Path, password: &str, extra: &[&str]) -> Output {
    let mut args = vec!["--mode", mode, "--target", target.to_str().unwrap()];
    args.extend_from_slice(extra);
    run_clenc_with_password(&args, password).unwrap()
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_hello_world_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("hello.txt");
    fs::write(&path, b"Hello, World!").unwrap();

    let result = run_mode("encrypt", &path, "mySecretPassword", &["--kdf-lanes", "4"]);
    assert_success(&result, "encrypt");
    let encrypted = fs::read(&path).unwrap();
    assert_eq!(encrypted.len(), 66);
    assert_eq!(&encrypted[..9], b"ENCRYTPED");

    let result = run_mode("decrypt", &path, "wrongPassword", &["--kdf-lanes", "4"]);
    // Per-file failures do not fail the run by default.
    assert!(result.status.success());
    assert_eq!(fs::read(&path).unwrap(), encrypted);

    let result = run_mode("decrypt", &path, "mySecretPassword", &["--kdf-lanes", "4"]);
    assert_success(&result, "decrypt");
    assert_eq!(fs::read(&path).unwrap(), b"Hello, World!");
}

#[test]
fn test_directory_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("tree");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("a.txt"), b"alpha").unwrap();
    fs::write(root.join("sub/b.bin"), [0u8, 1, 2, 3, 255]).unwrap();

    let result = run_mode("encrypt", &root, "test", &["--workers", "2"]);
    assert_success(&result, "encrypt");
    assert_ne!(fs::read(root.join("a.txt")).unwrap(), b"alpha");

    // Decrypting with a different worker count must work.
    let result = run_mode("decrypt", &root, "test", &["--workers", "1"]);
    assert_success(&result, "decrypt");
    assert_eq!(fs::read(root.join("a.txt")).unwrap(), b"alpha");
    assert_eq!(fs::read(root.join("sub/b.bin")).unwrap(), [0u8, 1, 2, 3, 255]);
}

#[test]
fn test_strict_fails_on_file_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("plain.txt");
    fs::write(&path, b"never encrypted").unwrap();

    let result = run_mode("decrypt", &path, "test", &[]);
    assert!(result.status.success());

    let result = run_mode("decrypt", &path, "test", &["--strict"]);
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("not encrypted"),
        "Expected error message about missing encryption, got: {}",
        stderr
    );
    assert_eq!(fs::read(&path).unwrap(), b"never encrypted");
}

#[test]
fn test_double_encrypt_needs_force() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("file.txt");
    fs::write(&path, b"data").unwrap();

    assert_success(&run_mode("encrypt", &path, "test", &[]), "encrypt");
    let once = fs::read(&path).unwrap();

    let result = run_mode("encrypt", &path, "test", &["--strict"]);
    assert!(!result.status.success());
    assert_eq!(fs::read(&path).unwrap(), once);

    assert_success(&run_mode("encrypt", &path, "test", &["--force"]), "forced encrypt");
    assert_ne!(fs::read(&path).unwrap(), once);
}

#[test]
fn test_missing_target_fails() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist");

    let result = run_mode("encrypt", &missing, "test", &[]);
    assert!(!result.status.success());
    assert!(!missing.exists());
}

#[test]
fn test_empty_password_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("file.txt");
    fs::write(&path, b"data").unwrap();

    let result = run_mode("encrypt", &path, "", &[]);
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("No password given."), "got: {}", stderr);
    assert_eq!(fs::read(&path).unwrap(), b"data");
}

#[test]
fn test_usage_errors() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("file.txt");
    fs::write(&path, b"data").unwrap();
    let target = path.to_str().unwrap();

    for args in [
        vec!["--mode", "encrypt"],
        vec!["--target", target],
        vec!["--mode", "scramble", "--target", target],
        vec!["--mode", "encrypt", "--target", target, "--workers", "0"],
    ] {
        let result = run_clenc_with_password(&args, "test").unwrap();
        assert!(!result.status.success(), "expected usage error for {:?}", args);
    }
    assert_eq!(fs::read(&path).unwrap(), b"data");
}
