use std::fs;

use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use scanner_core::SnapshotFormat;
use scanner_engine::{RetentionMode, SnapshotStore, StoreError, StoreSettings};
use tempfile::TempDir;

fn at(minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(12, minute, second)
        .unwrap()
}

fn store(temp: &TempDir, retention: RetentionMode) -> SnapshotStore {
    SnapshotStore::new(StoreSettings {
        root: temp.path().to_path_buf(),
        retention,
    })
}

fn file_names(store: &SnapshotStore, job: &str) -> Vec<String> {
    store
        .list(job)
        .unwrap()
        .iter()
        .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn snapshot_path_follows_job_layout() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp, RetentionMode::Enforce);

    let path = store
        .write("news", at(0, 0), SnapshotFormat::Text, "<h2>A</h2>")
        .unwrap();
    assert_eq!(
        path,
        temp.path()
            .join("news")
            .join("active_scans")
            .join("news_20240101_120000.txt")
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), "<h2>A</h2>");
}

#[test]
fn same_second_captures_get_sequence_suffix() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp, RetentionMode::Enforce);

    store.write("news", at(0, 0), SnapshotFormat::Json, "{}").unwrap();
    store.write("news", at(0, 0), SnapshotFormat::Json, "{}").unwrap();
    store.write("news", at(0, 0), SnapshotFormat::Json, "{}").unwrap();

    assert_eq!(
        file_names(&store, "news"),
        vec![
            "news_20240101_120000.json",
            "news_20240101_120000_1.json",
            "news_20240101_120000_2.json",
        ]
    );
}

#[test]
fn latest_reads_newest_snapshot() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp, RetentionMode::Enforce);

    store.write("news", at(1, 0), SnapshotFormat::Text, "older").unwrap();
    store.write("news", at(3, 0), SnapshotFormat::Csv, "newest").unwrap();
    store.write("news", at(2, 0), SnapshotFormat::Text, "middle").unwrap();

    let latest = store.latest("news").unwrap();
    assert_eq!(latest.content, "newest");
    assert_eq!(latest.captured_at, at(3, 0));
    assert_eq!(latest.format, SnapshotFormat::Csv);
    assert_eq!(latest.job_name, "news");
}

#[test]
fn latest_without_snapshots_is_not_found() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp, RetentionMode::Enforce);

    assert!(matches!(store.latest("news"), Err(StoreError::NotFound(job)) if job == "news"));
    assert_eq!(store.count("news").unwrap(), 0);
}

#[test]
fn listing_ignores_other_jobs_and_foreign_files() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp, RetentionMode::Enforce);

    store.write("news", at(0, 0), SnapshotFormat::Text, "a").unwrap();
    store.write("sports", at(0, 0), SnapshotFormat::Text, "b").unwrap();
    fs::write(store.job_dir("news").join("notes.txt"), "x").unwrap();
    fs::write(store.job_dir("news").join("news_20240101_120000.md"), "x").unwrap();

    assert_eq!(file_names(&store, "news"), vec!["news_20240101_120000.txt"]);
}

#[test]
fn retention_keeps_only_newest_snapshots() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp, RetentionMode::Enforce);

    for minute in 0..5 {
        store
            .write("news", at(minute * 5, 0), SnapshotFormat::Text, "x")
            .unwrap();
        store.enforce_retention("news", 3).unwrap();
    }

    assert_eq!(
        file_names(&store, "news"),
        vec![
            "news_20240101_121000.txt",
            "news_20240101_121500.txt",
            "news_20240101_122000.txt",
        ]
    );
}

#[test]
fn record_only_retention_keeps_everything() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp, RetentionMode::RecordOnly);

    for minute in 0..5 {
        store
            .write("news", at(minute * 5, 0), SnapshotFormat::Text, "x")
            .unwrap();
        assert_eq!(store.enforce_retention("news", 3).unwrap(), 0);
    }

    assert_eq!(store.count("news").unwrap(), 5);
}

#[test]
fn retention_reports_removed_count() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp, RetentionMode::Enforce);

    for second in 0..4 {
        store
            .write("news", at(0, second), SnapshotFormat::Text, "x")
            .unwrap();
    }

    assert_eq!(store.enforce_retention("news", 1).unwrap(), 3);
    assert_eq!(store.enforce_retention("news", 1).unwrap(), 0);
    assert_eq!(store.latest("news").unwrap().captured_at, at(0, 3));
}
