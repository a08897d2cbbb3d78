use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const CORPUS: &str = "\
# Full information about Amazon Share the Love products
Total items: 4

Id:   0
ASIN: 0771044445
  discontinued product

Id:   1
ASIN: 0827229534
  title: Patterns of Preaching: A Sermon Sampler
  group: Book
  salesrank: 396585
  similar: 5  0804215715  156101074X  0687023955  0687074231  082721619X
  categories: 2
   |Books[283155]|Subjects[1000]|Religion & Spirituality[22]|Christianity[12290]|Clergy[12360]|Preaching[12368]
   |Books[283155]|Subjects[1000]|Religion & Spirituality[22]|Christianity[12290]|Clergy[12360]|Sermons[12370]
  reviews: total: 2  downloaded: 2  avg rating: 5
    2000-7-28  cutomer: A2JW67OY8U6HHK  rating: 5  votes:  10  helpful:   9
    2003-12-14  cutomer: A2VE83MZF98ITY  rating: 5  votes:   6  helpful:   5

Id:   2
ASIN: 0738700797
  title: Candlemas: Feast of Flames
  group: Book
  salesrank: 168596
  similar: 5  0738700827  1567184960  1567182836  0738700525  0738700940
  categories: 2
   |Books[283155]|Subjects[1000]|Religion & Spirituality[22]|Earth-Based Religions[12472]|Wicca[12484]
   |Books[283155]|Subjects[1000]|Religion & Spirituality[22]|Earth-Based Religions[12472]|Witchcraft[12486]
  reviews: total: 12  downloaded: 12  avg rating: 4.5
    2001-12-16  cutomer: A11NCO6YTE4BTJ  rating: 5  votes:   5  helpful:   4
    2002-1-7  cutomer:  A9CQ3PLRNIR83  rating: 4  votes:   5  helpful:   5
    2002-13-45  cutomer:  BADDATE  rating: 4  votes:   5  helpful:   5

Id:   3
ASIN: 0804215715
  title: A Sermon Sampler
  group: Book
  salesrank: -3
  similar: 1  0827229534
  categories: 0
  reviews: total: 0  downloaded: 0  avg rating: 0
";

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_catalog-ingest"))
}

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/catalog.sqlite"

[ingest]
batch_size = 3
workers = 2
partitions = 3
"#,
        root.display()
    );
    let config_path = config_dir.join("catalog.toml");
    fs::write(&config_path, config_content).unwrap();

    let corpus_path = root.join("amazon-meta.txt");
    fs::write(&corpus_path, CORPUS).unwrap();

    (tmp, config_path, corpus_path)
}

fn run(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn load(config_path: &Path, corpus_path: &Path, extra: &[&str]) -> String {
    let mut args = vec!["load", corpus_path.to_str().unwrap(), "--progress", "off"];
    args.extend_from_slice(extra);
    let (stdout, stderr, success) = run(config_path, &args);
    assert!(success, "load failed: stdout={}, stderr={}", stdout, stderr);
    stdout
}

/// Second column of the stats row whose first column is `name`.
fn stat(stdout: &str, name: &str) -> i64 {
    stdout
        .lines()
        .find_map(|line| {
            let mut cols = line.split_whitespace();
            if cols.next() == Some(name) {
                cols.next().and_then(|n| n.parse().ok())
            } else {
                None
            }
        })
        .unwrap_or_else(|| panic!("no '{}' row in stats output:\n{}", name, stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/catalog.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, _, success1) = run(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_load_sample_corpus() {
    let (_tmp, config_path, corpus_path) = setup_test_env();

    run(&config_path, &["init"]);
    let stdout = load(&config_path, &corpus_path, &[]);
    assert!(stdout.contains("records: 4"), "{}", stdout);
    assert!(stdout.contains("incomplete records: 1"), "{}", stdout);
    assert!(stdout.contains("products upserted: 3"), "{}", stdout);
    assert!(stdout.contains("ok"));

    let (stats, _, success) = run(&config_path, &["stats"]);
    assert!(success);
    // 3 defined + 9 distinct similar targets not defined in the corpus
    assert_eq!(stat(&stats, "products"), 12);
    assert_eq!(stat(&stats, "placeholders"), 9);
    assert_eq!(stat(&stats, "categories"), 10);
    assert_eq!(stat(&stats, "product_categories"), 13);
    assert_eq!(stat(&stats, "similar_products"), 11);
    assert_eq!(stat(&stats, "reviews"), 4);
}

#[test]
fn test_load_without_init_creates_schema() {
    let (_tmp, config_path, corpus_path) = setup_test_env();

    let stdout = load(&config_path, &corpus_path, &[]);
    assert!(stdout.contains("ok"));
}

#[test]
fn test_reload_is_idempotent() {
    let (_tmp, config_path, corpus_path) = setup_test_env();

    load(&config_path, &corpus_path, &[]);
    let (first, _, _) = run(&config_path, &["stats"]);

    load(&config_path, &corpus_path, &["--partitions", "1", "--workers", "1"]);
    let (second, _, _) = run(&config_path, &["stats"]);

    for table in [
        "products",
        "placeholders",
        "categories",
        "product_categories",
        "similar_products",
        "reviews",
    ] {
        assert_eq!(stat(&first, table), stat(&second, table), "{}", table);
    }
}

#[test]
fn test_load_dry_run_writes_nothing() {
    let (tmp, config_path, corpus_path) = setup_test_env();

    let stdout = load(&config_path, &corpus_path, &["--dry-run"]);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("partitions: 3"), "{}", stdout);
    assert!(stdout.contains("records: 4"), "{}", stdout);
    assert!(stdout.contains("complete products: 3"), "{}", stdout);
    assert!(!tmp.path().join("data/catalog.sqlite").exists());
}

#[test]
fn test_load_missing_file_errors() {
    let (tmp, config_path, _) = setup_test_env();

    let missing = tmp.path().join("nope.txt");
    let (_, stderr, success) = run(
        &config_path,
        &["load", missing.to_str().unwrap(), "--progress", "off"],
    );
    assert!(!success);
    assert!(stderr.contains("Failed to open corpus"), "{}", stderr);
}

#[test]
fn test_load_rejects_unknown_progress_mode() {
    let (_tmp, config_path, corpus_path) = setup_test_env();

    let (_, stderr, success) = run(
        &config_path,
        &["load", corpus_path.to_str().unwrap(), "--progress", "loud"],
    );
    assert!(!success);
    assert!(stderr.contains("Unknown progress mode"));
}

#[test]
fn test_json_progress_lines() {
    let (_tmp, config_path, corpus_path) = setup_test_env();

    let (_, stderr, success) = run(
        &config_path,
        &["load", corpus_path.to_str().unwrap(), "--progress", "json"],
    );
    assert!(success, "{}", stderr);
    let events: Vec<serde_json::Value> = stderr
        .lines()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();
    let finished = events
        .iter()
        .filter(|e| e["event"] == "phase_finished")
        .count();
    assert_eq!(finished, 2);
    assert!(events
        .iter()
        .any(|e| e["event"] == "task_finished" && e["task"] == "similarity"));
}

#[test]
fn test_invalid_config_errors() {
    let (_tmp, config_path, _) = setup_test_env();
    fs::write(&config_path, "[db]\npath = \"x.sqlite\"\n[ingest]\nbatch_size = 0\n").unwrap();

    let (_, stderr, success) = run(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("batch_size"));
}
