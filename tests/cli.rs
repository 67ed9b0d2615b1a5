use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docsift_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docsift"))
}

fn setup_batch() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let batch = root.join("batch");
    fs::create_dir_all(&batch).unwrap();
    fs::write(batch.join("garbage.pdf"), b"this is not a pdf at all").unwrap();
    fs::write(batch.join("other.pdf"), b"%PDF-1.4 truncated").unwrap();
    fs::write(batch.join("notes.txt"), b"ignored").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("docsift.toml");
    fs::write(
        &config_path,
        r#"[analysis]
similarity_threshold = 0.8

[detection]
api_key_env = "DOCSIFT_CLI_TEST_KEY"
max_attempts = 1
"#,
    )
    .unwrap();

    (tmp, config_path)
}

fn run_docsift(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docsift_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("DOCSIFT_CLI_TEST_KEY")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docsift binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_extract_lists_failed_files_without_aborting() {
    let (tmp, config_path) = setup_batch();
    let batch = tmp.path().join("batch");

    let (stdout, stderr, success) = run_docsift(&config_path, &["extract", batch.to_str().unwrap()]);
    assert!(success, "extract failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files found: 2"), "got: {}", stdout);
    assert!(stdout.contains("extracted: 0"), "got: {}", stdout);
    assert!(stdout.contains("garbage.pdf  failed"), "got: {}", stdout);
    assert!(!stdout.contains("notes.txt"));
}

#[test]
fn test_extract_missing_directory_fails() {
    let (tmp, config_path) = setup_batch();
    let missing = tmp.path().join("nope");

    let (_, stderr, success) = run_docsift(&config_path, &["extract", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Invalid folder"), "got: {}", stderr);
}

#[test]
fn test_analyze_requires_credential() {
    let (tmp, config_path) = setup_batch();
    let batch = tmp.path().join("batch");

    let (_, stderr, success) = run_docsift(&config_path, &["analyze", batch.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("DOCSIFT_CLI_TEST_KEY"), "got: {}", stderr);
    assert!(!batch.join("analysis_report.json").exists());
}

#[test]
fn test_invalid_threshold_in_config_is_rejected() {
    let (tmp, config_path) = setup_batch();
    fs::write(&config_path, "[analysis]\nsimilarity_threshold = 2.0\n").unwrap();
    let batch = tmp.path().join("batch");

    let (_, stderr, success) = run_docsift(&config_path, &["extract", batch.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("similarity threshold"), "got: {}", stderr);
}

#[test]
fn test_compare_missing_file_fails() {
    let (tmp, config_path) = setup_batch();
    let batch = tmp.path().join("batch");

    let (_, stderr, success) = run_docsift(
        &config_path,
        &["compare", batch.to_str().unwrap(), "garbage.pdf", "missing.pdf"],
    );
    assert!(!success);
    assert!(stderr.contains("File not found"), "got: {}", stderr);
}

#[test]
fn test_compare_unreadable_files_reports_degenerate_vocabulary() {
    let (tmp, config_path) = setup_batch();
    let batch = tmp.path().join("batch");

    let (_, stderr, success) = run_docsift(
        &config_path,
        &["compare", batch.to_str().unwrap(), "garbage.pdf", "other.pdf"],
    );
    assert!(!success);
    assert!(stderr.contains("empty vocabulary"), "got: {}", stderr);
}
