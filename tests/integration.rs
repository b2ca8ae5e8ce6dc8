//! End-to-end tests that run the `docsage` binary against a scratch corpus.
//!
//! The config uses the offline `hash` embedder and the `ollama` chat
//! provider (no API key needed). Questions are arranged so the model is
//! never actually contacted.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn docsage_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docsage"))
}

fn setup_test_env(min_score: Option<f32>) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("acts")).unwrap();
    fs::write(
        files_dir.join("constitution.md"),
        "# Constitution\n\nArticle 14 guarantees equality before the law.\n\nArticle 21 protects life and personal liberty.",
    )
    .unwrap();
    fs::write(
        files_dir.join("acts/contract.txt"),
        "The Contract Act defines offer and acceptance.\n\nConsideration is required for a valid contract.",
    )
    .unwrap();
    fs::write(
        files_dir.join("notes.txt"),
        "Weather notes.\n\nThe sky is blue.",
    )
    .unwrap();
    fs::write(files_dir.join("scan.pdf"), "not really a pdf").unwrap();

    let retrieval = match min_score {
        Some(s) => format!("[retrieval]\ntop_k = 2\nmin_score = {}\n", s),
        None => "[retrieval]\ntop_k = 2\n".to_string(),
    };

    let config_content = format!(
        r#"[store]
dir = "{root}/db/vector_store"

[loader]
root = "{root}/files"

[chunking]
max_tokens = 30
overlap_tokens = 5

[embedding]
provider = "hash"
dims = 128

[llm]
provider = "ollama"
base_url = "http://127.0.0.1:9"
model = "llama-3.1-8b-instant"

{retrieval}"#,
        root = root.display(),
        retrieval = retrieval
    );

    let config_path = config_dir.join("docsage.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docsage(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docsage_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docsage binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_build_indexes_supported_files() {
    let (_tmp, config_path) = setup_test_env(None);

    let (stdout, stderr, success) = run_docsage(&config_path, &["build", "--progress", "off"]);
    assert!(success, "build failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents loaded: 3"), "{}", stdout);
    assert!(stdout.contains("files skipped: 1"), "{}", stdout);
    assert!(stdout.contains("by type: text/markdown 1, text/plain 2"), "{}", stdout);
    assert!(stdout.contains("feature-hash-v1 (128 dims)"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_build_writes_index_and_metadata() {
    let (tmp, config_path) = setup_test_env(None);
    run_docsage(&config_path, &["build", "--progress", "off"]);

    let store = tmp.path().join("db/vector_store");
    assert!(store.join("index.bin").is_file());
    assert!(store.join("metadata.json").is_file());

    let meta: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.join("metadata.json")).unwrap()).unwrap();
    assert_eq!(meta["embedding_model"], "feature-hash-v1");
    assert_eq!(meta["dims"], 128);
    assert_eq!(meta["count"], meta["chunks"].as_array().unwrap().len());
}

#[test]
fn test_build_json_progress_on_stderr() {
    let (_tmp, config_path) = setup_test_env(None);
    let (stdout, stderr, success) = run_docsage(&config_path, &["build", "--progress", "json"]);
    assert!(success, "build failed: {}", stderr);

    let phases: Vec<String> = stderr
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .filter(|v| v["event"] == "progress")
        .map(|v| v["phase"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(phases.first().map(String::as_str), Some("chunked"));
    assert_eq!(phases.last().map(String::as_str), Some("persisted"));
    assert!(!stdout.contains("\"event\""));
}

#[test]
fn test_build_root_override() {
    let (tmp, config_path) = setup_test_env(None);
    let root = tmp.path().join("files/acts");
    let (stdout, stderr, success) = run_docsage(
        &config_path,
        &["build", "--progress", "off", "--root", root.to_str().unwrap()],
    );
    assert!(success, "build failed: {}", stderr);
    assert!(stdout.contains("documents loaded: 1"), "{}", stdout);
}

#[test]
fn test_build_empty_corpus_fails() {
    let (tmp, config_path) = setup_test_env(None);
    let empty = tmp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();

    let (_, stderr, success) = run_docsage(
        &config_path,
        &["build", "--progress", "off", "--root", empty.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("Nothing to index"), "{}", stderr);
    assert!(!tmp.path().join("db/vector_store/index.bin").exists());
}

#[test]
fn test_status_without_index() {
    let (_tmp, config_path) = setup_test_env(None);
    let (stdout, _, success) = run_docsage(&config_path, &["status"]);
    assert!(!success);
    assert!(stdout.contains("missing"));
    assert!(stdout.contains("docsage build"));
}

#[test]
fn test_status_after_build() {
    let (_tmp, config_path) = setup_test_env(None);
    run_docsage(&config_path, &["build", "--progress", "off"]);

    let (stdout, stderr, success) = run_docsage(&config_path, &["status"]);
    assert!(success, "status failed: {}", stderr);
    assert!(stdout.contains("ready"));
    assert!(stdout.contains("Documents:   3"), "{}", stdout);
    assert!(stdout.contains("feature-hash-v1"));
}

#[test]
fn test_query_ranks_matching_document_first() {
    let (_tmp, config_path) = setup_test_env(None);
    run_docsage(&config_path, &["build", "--progress", "off"]);

    let (stdout, stderr, success) = run_docsage(&config_path, &["query", "personal liberty", "--top-k", "1"]);
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.starts_with("1. ["), "{}", stdout);
    assert!(stdout.contains("constitution.md"), "{}", stdout);
    assert!(!stdout.contains("2. ["));
}

#[test]
fn test_query_is_deterministic() {
    let (_tmp, config_path) = setup_test_env(None);
    run_docsage(&config_path, &["build", "--progress", "off"]);

    let (a, _, _) = run_docsage(&config_path, &["query", "contract offer"]);
    let (b, _, _) = run_docsage(&config_path, &["query", "contract offer"]);
    assert_eq!(a, b);
}

#[test]
fn test_query_without_index_fails_with_hint() {
    let (_tmp, config_path) = setup_test_env(None);
    let (_, stderr, success) = run_docsage(&config_path, &["query", "sky"]);
    assert!(!success);
    assert!(stderr.contains("docsage build"), "{}", stderr);
}

#[test]
fn test_query_after_embedding_model_change_fails() {
    let (_tmp, config_path) = setup_test_env(None);
    run_docsage(&config_path, &["build", "--progress", "off"]);

    let config = fs::read_to_string(&config_path).unwrap();
    fs::write(&config_path, config.replace("dims = 128", "dims = 64")).unwrap();

    let (_, stderr, success) = run_docsage(&config_path, &["query", "sky"]);
    assert!(!success);
    assert!(stderr.contains("rebuild the index"), "{}", stderr);
}

#[test]
fn test_ask_without_relevant_chunks_skips_model() {
    let (_tmp, config_path) = setup_test_env(Some(1.5));
    run_docsage(&config_path, &["build", "--progress", "off"]);

    let (stdout, stderr, success) = run_docsage(&config_path, &["ask", "What colour is the sky?"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("No relevant information found"), "{}", stdout);
}

#[test]
fn test_ask_reports_unreachable_model() {
    let (_tmp, config_path) = setup_test_env(None);
    run_docsage(&config_path, &["build", "--progress", "off"]);

    let (_, stderr, success) = run_docsage(&config_path, &["ask", "What colour is the sky?"]);
    assert!(!success);
    assert!(stderr.contains("language model call failed"), "{}", stderr);
}

#[test]
fn test_chat_commands_and_exit() {
    let (_tmp, config_path) = setup_test_env(Some(1.5));
    run_docsage(&config_path, &["build", "--progress", "off"]);

    let mut child = Command::new(docsage_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("chat")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"/models\nwhat is the sky?\n/history\n/model Gemma 2 9B (Google)\n/clear\n/history\nEXIT\nnever read\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("mixtral-8x7b-32768"));
    assert!(stdout.contains("No relevant information found"));
    assert!(stdout.contains("[user] what is the sky?"));
    assert!(stdout.contains("Switched to gemma2-9b-it."));
    assert!(stdout.contains("History cleared."));
    assert!(stdout.contains("(no messages)"));
}

#[test]
fn test_models_lists_presets_without_config() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.toml");
    let (stdout, _, success) = run_docsage(&missing, &["models"]);
    assert!(success);
    assert!(stdout.contains("Llama 3.1 8B (Fastest)"));
    assert!(stdout.contains("llama-3.1-8b-instant (default)"));
    assert_eq!(stdout.lines().count(), 6);
}

#[test]
fn test_init_writes_config_once() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config/docsage.toml");

    let (stdout, _, success) = run_docsage(&path, &["init"]);
    assert!(success);
    assert!(stdout.contains("Wrote"));
    assert!(path.is_file());

    let (_, stderr, success) = run_docsage(&path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("already exists"));
}
