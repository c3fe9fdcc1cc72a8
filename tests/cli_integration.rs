//! Integration tests for the `canonc` CLI binary.
//!
//! Ignored by default since they shell out to the built binary rather
//! than calling the library directly; run with `cargo test --features
//! cli -- --ignored` after `cargo build --release --features cli --bin
//! canonc`.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn canonc_binary() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("target");
    path.push("release");
    path.push("canonc");
    path
}

#[test]
#[ignore = "requires cargo build --release --features cli --bin canonc"]
fn check_succeeds_on_a_minimal_project() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("main.canon"), "project \"p\" do end\n").expect("write main.canon");

    let output = Command::new(canonc_binary())
        .arg("check")
        .arg(dir.path())
        .output()
        .expect("failed to run canonc check");

    assert!(
        output.status.success(),
        "canonc check failed:\nstdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
#[ignore = "requires cargo build --release --features cli --bin canonc"]
fn compile_writes_canonical_output_files() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("main.canon"),
        "project \"p\" do end\naxis moral \"Moral Axis\" good -> evil\n",
    )
    .expect("write main.canon");
    let output_dir = dir.path().join("out");

    let status = Command::new(canonc_binary())
        .arg("compile")
        .arg(dir.path())
        .arg("--output")
        .arg(&output_dir)
        .status()
        .expect("failed to run canonc compile");

    assert!(status.success());
    assert!(output_dir.join("project.canon").exists(), "expected project.canon in output directory");
}
