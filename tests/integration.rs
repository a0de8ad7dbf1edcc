use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ryoma_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ryoma");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let raw_dir = root.join("data/raw");
    fs::create_dir_all(raw_dir.join("letters")).unwrap();
    fs::write(
        raw_dir.join("竜馬がゆく.txt"),
        "竜馬がゆく\r\n\r\n\r\n\r\n土佐の郷士、坂本竜馬。\u{0007}\n",
    )
    .unwrap();
    fs::write(
        raw_dir.join("letters/Letter to Otome.txt"),
        "姉上様へ。\n日本を今一度せんたくいたし申候。\n",
    )
    .unwrap();
    // Same content as the letter: dropped as a duplicate.
    fs::write(
        raw_dir.join("letters/copy.txt"),
        "姉上様へ。\r\n日本を今一度せんたくいたし申候。\r\n",
    )
    .unwrap();
    fs::write(raw_dir.join("blank.txt"), "  \n\n\t\n").unwrap();

    let config_content = format!(
        r#"[paths]
raw_dir = "{root}/data/raw"
cleaned_dir = "{root}/data/cleaned"
metadata_dir = "{root}/data/metadata"

[clean]
tokenizer = "chars"

[server]
bind = "127.0.0.1:8000"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("ryoma.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ryoma(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ryoma_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ryoma binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn read_jsonl(path: &Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_clean_writes_corpus_and_manifest() {
    let (tmp, config) = setup_test_env();
    let root = tmp.path();

    let (stdout, stderr, success) = run_ryoma(&config, &["clean"]);
    assert!(success, "clean failed: {}", stderr);
    assert!(stdout.contains("scanned: 4 files"), "stdout: {}", stdout);
    assert!(stdout.contains("written: 2 documents"));
    assert!(stdout.contains("duplicates skipped: 1"));
    assert!(stdout.contains("empty skipped: 1"));
    assert!(stdout.contains("errors: 0"));
    assert!(stdout.trim_end().ends_with("ok"));

    let records = read_jsonl(&root.join("data/metadata/manifest_local.jsonl"));
    assert_eq!(records.len(), 2);

    for record in &records {
        let hash = record["hash"].as_str().unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(record["doc_id"].as_str().unwrap(), &hash[..16]);
        assert_eq!(record["lang"], "ja");
        assert_eq!(record["source"], "unknown");
        assert_eq!(record["license"], "unknown");
        assert_eq!(record["tags"], serde_json::json!(["ryoma", "bakumatsu"]));
        assert!(record["created_at"].as_str().unwrap().ends_with("+09:00"));

        let local = PathBuf::from(record["local_path"].as_str().unwrap());
        let body = fs::read_to_string(&local).unwrap();
        assert_eq!(record["char_count"], body.chars().count());
    }

    let ryoma = records
        .iter()
        .find(|r| r["title"] == "竜馬がゆく")
        .expect("manifest has the 竜馬がゆく record");
    let body = fs::read_to_string(ryoma["local_path"].as_str().unwrap()).unwrap();
    assert_eq!(body, "竜馬がゆく\n\n土佐の郷士、坂本竜馬。");

    let letter = records
        .iter()
        .find(|r| r["title"] == "Letter to Otome")
        .expect("manifest has the letter record");
    assert!(letter["local_path"]
        .as_str()
        .unwrap()
        .ends_with("letter-to-otome.txt"));
}

#[test]
fn test_clean_dry_run_writes_nothing() {
    let (tmp, config) = setup_test_env();
    let root = tmp.path();

    let (stdout, stderr, success) = run_ryoma(&config, &["clean", "--dry-run"]);
    assert!(success, "dry run failed: {}", stderr);
    assert!(stdout.contains("written: 2 documents"));
    assert!(stdout.contains("dry run"));
    assert!(!root.join("data/cleaned").exists());
    assert!(!root.join("data/metadata/manifest_local.jsonl").exists());
}

#[test]
fn test_clean_limit() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_ryoma(&config, &["clean", "--limit", "1"]);
    assert!(success);
    assert!(stdout.contains("scanned: 1 files"));
}

#[test]
fn test_clean_json_progress_on_stderr() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_ryoma(&config, &["clean", "--progress", "json"]);
    assert!(success);
    assert!(stderr.contains("\"phase\":\"cleaning\""));
    assert!(!stdout.contains("\"phase\""));
}

#[test]
fn test_enrich_after_clean() {
    let (tmp, config) = setup_test_env();
    let root = tmp.path();

    let (_, stderr, success) = run_ryoma(&config, &["clean"]);
    assert!(success, "clean failed: {}", stderr);

    fs::write(
        root.join("data/metadata/source_log.csv"),
        "\u{FEFF}作品名,URL,License\n\
         竜馬がゆく,https://example.jp/ryoma,CC-BY-4.0\n\
         Letter to Sakamoto Otome (1863),https://example.jp/letter,PD\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_ryoma(&config, &["enrich"]);
    assert!(success, "enrich failed: {}", stderr);
    assert!(stdout.contains("exact: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("fuzzy: 1"));
    assert!(stdout.contains("missing: 0"));
    assert!(stdout.contains("manifest_enriched.jsonl"));

    let records = read_jsonl(&root.join("data/metadata/manifest_enriched.jsonl"));
    let ryoma = records.iter().find(|r| r["title"] == "竜馬がゆく").unwrap();
    assert_eq!(ryoma["source"], "https://example.jp/ryoma");
    assert_eq!(ryoma["license"], "CC-BY-4.0");
    let letter = records
        .iter()
        .find(|r| r["title"] == "Letter to Otome")
        .unwrap();
    assert_eq!(letter["source"], "https://example.jp/letter");
    assert_eq!(letter["license"], "PD");

    let (stdout, _, success) = run_ryoma(&config, &["stats"]);
    assert!(success);
    assert!(stdout.contains("manifest_enriched.jsonl"));
    assert!(stdout.contains("Documents:   2"));
    assert!(stdout.contains("CC-BY-4.0"));
}

#[test]
fn test_enrich_missing_csv_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, _, success) = run_ryoma(&config, &["clean"]);
    assert!(success);

    let (_, stderr, success) = run_ryoma(&config, &["enrich"]);
    assert!(!success);
    assert!(stderr.contains("CSV not found"), "stderr: {}", stderr);
}

#[test]
fn test_enrich_csv_without_title_column_fails() {
    let (tmp, config) = setup_test_env();
    let (_, _, success) = run_ryoma(&config, &["clean"]);
    assert!(success);

    let csv = tmp.path().join("other.csv");
    fs::write(&csv, "url,license\nhttps://x,PD\n").unwrap();

    let (_, stderr, success) = run_ryoma(&config, &["enrich", "--csv", csv.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("no title-like column"), "stderr: {}", stderr);
}

#[test]
fn test_stats_without_manifest_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_ryoma(&config, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read manifest"));
}

#[test]
fn test_invalid_progress_mode_rejected() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_ryoma(&config, &["clean", "--progress", "loud"]);
    assert!(!success);
    assert!(stderr.contains("invalid progress mode"));
}
