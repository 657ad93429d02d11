use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn schemadex_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_schemadex"))
}

const ORDERS: &str = "# Table: sales.orders\n\
\n\
Orders placed by customers through the storefront.\n\
\n\
## Columns\n\
| Column | Type | Nullable | Description |\n\
|--------|------|----------|-------------|\n\
| id | bigint PK | no | Order identifier |\n\
| customer_id | bigint | no | Buyer |\n\
\n\
## Foreign Keys\n\
- customer_id -> sales.customers(id)\n";

const CUSTOMERS: &str = "# Table: sales.customers\n\
\n\
People who buy things.\n\
\n\
## Columns\n\
| Column | Type | Nullable | Description |\n\
|--------|------|----------|-------------|\n\
| id | bigint PK | no | Customer identifier |\n\
| region_id | bigint | yes | Home region |\n\
\n\
## Foreign Keys\n\
- region_id -> geo.regions(id)\n";

const REGIONS: &str = "# Table: geo.regions\n\
\n\
Sales regions.\n\
\n\
## Columns\n\
| Column | Type | Nullable | Description |\n\
|--------|------|----------|-------------|\n\
| id | bigint PK | no | Region identifier |\n";

const DOMAIN: &str = "# Domain: sales\n\nEverything about selling.\n";

/// Documents written by a full run of the default tree: four sources and
/// five columns.
const DOCS: usize = 9;

fn write_manifest(root: &Path, files: &[(&str, &str, &str)]) -> PathBuf {
    let docs_dir = root.join("docs");
    let mut entries = Vec::new();
    for (doc_type, path, text) in files {
        let full = docs_dir.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, text).unwrap();
        entries.push(serde_json::json!({
            "type": doc_type,
            "path": path,
            "content_hash": schemadex_core::models::content_hash(text),
        }));
    }
    let manifest = serde_json::json!({
        "version": 1,
        "database": "shop",
        "plan_hash": "plan-1",
        "entries": entries,
    });
    let manifest_path = docs_dir.join("manifest.json");
    fs::write(&manifest_path, manifest.to_string()).unwrap();
    manifest_path
}

fn default_files() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        ("table", "tables/orders.md", ORDERS),
        ("table", "tables/customers.md", CUSTOMERS),
        ("table", "tables/regions.md", REGIONS),
        ("domain", "domains/sales.md", DOMAIN),
    ]
}

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/schemadex.sqlite"

[indexer]
checkpoint_every = 1
max_hops = 3

[embedding]
provider = "disabled"
"#,
        root.display()
    );
    let config_path = config_dir.join("schemadex.toml");
    fs::write(&config_path, config_content).unwrap();

    let manifest_path = write_manifest(&root, &default_files());
    (tmp, config_path, manifest_path)
}

fn run_schemadex(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = schemadex_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run schemadex binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn index(config_path: &Path, manifest: &Path, extra: &[&str]) -> String {
    let mut args = vec!["index", manifest.to_str().unwrap()];
    args.extend_from_slice(extra);
    let (stdout, stderr, success) = run_schemadex(config_path, &args);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    stdout
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_schemadex(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, _, success1) = run_schemadex(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_schemadex(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_index_full() {
    let (_tmp, config_path, manifest) = setup_test_env();

    let stdout = index(&config_path, &manifest, &[]);
    assert!(stdout.contains("index shop (full)"));
    assert!(stdout.contains(&format!("documents written: {}", DOCS)));
    assert!(stdout.contains("relationships: 2 (rebuilt)"));
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_index_idempotent_no_duplicates() {
    let (_tmp, config_path, manifest) = setup_test_env();

    index(&config_path, &manifest, &[]);
    let (first, _, _) = run_schemadex(&config_path, &["search", "storefront"]);
    index(&config_path, &manifest, &[]);
    let (second, _, _) = run_schemadex(&config_path, &["search", "storefront"]);
    assert_eq!(first, second);
    assert!(first.contains("path: tables/orders.md"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let (_tmp, config_path, manifest) = setup_test_env();

    let stdout = index(&config_path, &manifest, &["--dry-run"]);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("new: 4"));

    let (_, _, found) = run_schemadex(&config_path, &["get", "tables/orders.md"]);
    assert!(!found, "dry run stored a document");
}

#[test]
fn test_status_after_index() {
    let (_tmp, config_path, manifest) = setup_test_env();
    index(&config_path, &manifest, &[]);

    let (stdout, stderr, success) = run_schemadex(
        &config_path,
        &["status", manifest.to_str().unwrap(), "--incremental"],
    );
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("new: 0"));
    assert!(stdout.contains("unchanged: 4"));
    assert!(stdout.contains("relationships: keep"));
    assert!(stdout.contains("checkpoint: none"));
    assert!(stdout.contains("index up to date: yes"));
}

#[test]
fn test_incremental_picks_up_changes() {
    let (tmp, config_path, manifest) = setup_test_env();
    index(&config_path, &manifest, &[]);

    let edited = ORDERS.replace("through the storefront", "through the mobile app");
    let files = vec![
        ("table", "tables/orders.md", edited.as_str()),
        ("table", "tables/customers.md", CUSTOMERS),
        ("table", "tables/regions.md", REGIONS),
    ];
    fs::remove_file(tmp.path().join("docs/domains/sales.md")).unwrap();
    let manifest = write_manifest(tmp.path(), &files);

    let stdout = index(&config_path, &manifest, &["--incremental"]);
    assert!(stdout.contains("index shop (incremental)"));
    assert!(stdout.contains("changed: 1"));
    assert!(stdout.contains("deleted: 1"));
    assert!(stdout.contains("unchanged: 2"));

    let (stdout, _, _) = run_schemadex(&config_path, &["search", "mobile"]);
    assert!(stdout.contains("path: tables/orders.md"));
    let (_, _, found) = run_schemadex(&config_path, &["get", "domains/sales.md"]);
    assert!(!found, "deleted document is still stored");
}

#[test]
fn test_interrupted_run_resumes() {
    let (_tmp, config_path, manifest) = setup_test_env();

    let stdout = index(&config_path, &manifest, &["--max-documents", "3"]);
    assert!(stdout.contains("documents written: 3"));
    assert!(stdout.contains("interrupted"));

    let (status, _, _) = run_schemadex(&config_path, &["status", manifest.to_str().unwrap()]);
    assert!(status.contains("resumable"));

    let stdout = index(&config_path, &manifest, &["--resume"]);
    assert!(stdout.contains("resumed: 3 already done"));
    assert!(stdout.contains(&format!("documents written: {}", DOCS - 3)));
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_path_between_tables() {
    let (_tmp, config_path, manifest) = setup_test_env();
    index(&config_path, &manifest, &[]);

    let (stdout, stderr, success) = run_schemadex(
        &config_path,
        &["path", "orders", "regions", "--database", "shop"],
    );
    assert!(success, "path failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("hops: 2"));
    assert!(stdout.contains(
        "join: sales.orders.customer_id = sales.customers.id AND sales.customers.region_id = geo.regions.id"
    ));

    let (stdout, _, success) = run_schemadex(
        &config_path,
        &["path", "orders", "regions", "--database", "shop", "--max-hops", "1"],
    );
    assert!(success);
    assert!(stdout.contains("not found within 1 hops"));
}

#[test]
fn test_get_document() {
    let (_tmp, config_path, manifest) = setup_test_env();
    index(&config_path, &manifest, &[]);

    let (stdout, stderr, success) =
        run_schemadex(&config_path, &["get", "tables/orders.md#customer_id"]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("type:         column"));
    assert!(stdout.contains("column:       customer_id"));
    assert!(stdout.contains("parent:"));
}

#[test]
fn test_invalid_manifest_fails() {
    let (tmp, config_path, _) = setup_test_env();
    let bad = tmp.path().join("bad.json");
    fs::write(&bad, r#"{"version": 1, "database": "", "plan_hash": "p"}"#).unwrap();

    let (_, stderr, success) = run_schemadex(&config_path, &["index", bad.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Invalid manifest"));
}

#[test]
fn test_search_rejects_empty_query() {
    let (_tmp, config_path, _) = setup_test_env();
    let (_, _, success) = run_schemadex(&config_path, &["search", "  "]);
    assert!(!success);
}
