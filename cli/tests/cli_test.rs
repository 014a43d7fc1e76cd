//! End-to-end tests for the defectgraph binary using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const OBSERVATIONS: &str = r#"[
  {"image_path": "bottle/test/broken_large/000.png", "product": "bottle",
   "defect_category": "broken_large", "caption": "a large crack on the rim"},
  {"image_path": "screw/test/scratch_head/000.png", "product": "screw",
   "defect_category": "scratch_head", "caption": "a scratch across the head"},
  {"image_path": "tile/test/glue_strip/000.png", "product": "tile",
   "defect_category": "glue_strip", "caption": "a strip of glue"}
]"#;

/// Runs from inside the temp dir so no stray `config/` files are picked up.
#[allow(deprecated)]
fn defectgraph(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("defectgraph").unwrap();
    cmd.current_dir(dir.path());
    cmd.env("DEFECTGRAPH__INGESTION__REQUEST_INTERVAL_MS", "0");
    cmd
}

fn snapshot_path(dir: &TempDir) -> PathBuf {
    dir.path().join("graph.json")
}

fn ingest_fixture(dir: &TempDir) {
    let observations = dir.path().join("observations.json");
    std::fs::write(&observations, OBSERVATIONS).unwrap();
    defectgraph(dir)
        .arg("--snapshot")
        .arg(snapshot_path(dir))
        .arg("ingest")
        .arg(&observations)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"images_ingested\": 3"))
        .stdout(predicate::str::contains("\"equipment_links\": 2"));
}

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"\x89PNG").unwrap();
}

#[test]
fn test_stats_without_snapshot_is_empty_graph() {
    let dir = TempDir::new().unwrap();
    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_nodes\": 0"));
}

#[test]
fn test_ingest_then_query() {
    let dir = TempDir::new().unwrap();
    ingest_fixture(&dir);
    assert!(snapshot_path(&dir).is_file());

    defectgraph(&dir)
        .args(["stats", "--snapshot"])
        .arg(snapshot_path(&dir))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_nodes\": 12"))
        .stdout(predicate::str::contains("\"total_relationships\": 5"));

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .args(["defects", "BOTTLE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"crack\""))
        .stdout(predicate::str::contains("\"severity\": \"high\""));

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("insights")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Most common defect: 'crack' found in 1 instances",
        ));

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("similar")
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn test_ingest_without_domain_knowledge() {
    let dir = TempDir::new().unwrap();
    let observations = dir.path().join("observations.json");
    std::fs::write(&observations, OBSERVATIONS).unwrap();

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("ingest")
        .arg(&observations)
        .arg("--no-domain-knowledge")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"equipment_links\": 0"));

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("equipment")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"usage\": []"));
}

#[test]
fn test_ingest_rejects_malformed_observations() {
    let dir = TempDir::new().unwrap();
    let observations = dir.path().join("observations.json");
    std::fs::write(&observations, r#"{"product": "bottle"}"#).unwrap();

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("ingest")
        .arg(&observations)
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON array"));
    assert!(!snapshot_path(&dir).exists());
}

#[test]
fn test_ingest_keeps_unreadable_snapshot() {
    let dir = TempDir::new().unwrap();
    let observations = dir.path().join("observations.json");
    std::fs::write(&observations, OBSERVATIONS).unwrap();
    let existing = r#"{"nodes": [{"id": "d_old", "type": "defect", "properties": {"name": "crack"}}], "relationships": ["#;
    std::fs::write(snapshot_path(&dir), existing).unwrap();

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("ingest")
        .arg(&observations)
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));
    assert_eq!(std::fs::read_to_string(snapshot_path(&dir)).unwrap(), existing);
}

#[test]
fn test_ingest_appends_to_snapshot_without_offset_timestamp() {
    let dir = TempDir::new().unwrap();
    let observations = dir.path().join("observations.json");
    std::fs::write(&observations, OBSERVATIONS).unwrap();
    std::fs::write(
        snapshot_path(&dir),
        r#"{"nodes": [{"id": "d_old", "type": "defect", "properties": {"name": "crack"}}],
            "relationships": [], "savedAt": "2024-01-02T03:04:05.1234567", "version": "1.0"}"#,
    )
    .unwrap();

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("ingest")
        .arg(&observations)
        .assert()
        .success();
    let saved = std::fs::read_to_string(snapshot_path(&dir)).unwrap();
    assert!(saved.contains("\"d_old\""));
}

#[test]
fn test_scan_modes_report_the_same_pairs() {
    let dir = TempDir::new().unwrap();
    let observations = dir.path().join("observations.json");
    std::fs::write(
        &observations,
        r#"[
  {"image_path": "bottle/000.png", "product": "bottle", "defect_category": "broken_large", "caption": "crack"},
  {"image_path": "tile/000.png", "product": "tile", "defect_category": "crack", "caption": "crack"}
]"#,
    )
    .unwrap();
    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("ingest")
        .arg(&observations)
        .assert()
        .success();

    for mode in ["exhaustive", "buckets"] {
        defectgraph(&dir)
            .arg("--snapshot")
            .arg(snapshot_path(&dir))
            .args(["--scan", mode, "insights"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Found 1 cross-product defect patterns - enabling knowledge transfer!",
            ));
    }

    defectgraph(&dir)
        .args(["similar", "--scan", "sideways"])
        .assert()
        .failure();
}

#[test]
fn test_clear_removes_snapshot() {
    let dir = TempDir::new().unwrap();
    ingest_fixture(&dir);

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"deleted\": true"));
    assert!(!snapshot_path(&dir).exists());

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"deleted\": false"));
}

#[test]
fn test_build_uses_cache_on_second_run() {
    let dir = TempDir::new().unwrap();
    let dataset = dir.path().join("mvtec");
    touch(&dataset, "bottle/test/broken_large/000.png");
    touch(&dataset, "bottle/test/good/000.png");
    touch(&dataset, "screw/test/scratch_head/000.png");

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("build")
        .arg("--dataset")
        .arg(&dataset)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"from_cache\": false"))
        .stdout(predicate::str::contains("\"defects\": 2"));

    defectgraph(&dir)
        .arg("--snapshot")
        .arg(snapshot_path(&dir))
        .arg("build")
        .arg("--dataset")
        .arg(&dataset)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"from_cache\": true"))
        .stdout(predicate::str::contains("\"defects\": 2"));
}

#[test]
fn test_defects_requires_product_argument() {
    let dir = TempDir::new().unwrap();
    defectgraph(&dir).arg("defects").assert().failure();
}
