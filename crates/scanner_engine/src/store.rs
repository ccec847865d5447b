use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use scan_logging::{scan_debug, scan_warn};
use scanner_core::SnapshotFormat;
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::Snapshot;

const ACTIVE_SCANS_DIR: &str = "active_scans";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;
const MAX_SEQUENCE: u32 = 999;

/// Whether the store deletes snapshots beyond a job's retention limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionMode {
    /// Delete the oldest snapshots once a job has more than its limit.
    #[default]
    Enforce,
    /// Keep every snapshot; the limit is recorded but never applied.
    RecordOnly,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub root: PathBuf,
    pub retention: RetentionMode,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            retention: RetentionMode::Enforce,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no snapshot found for job {0:?}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A snapshot file recognised on disk, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub path: PathBuf,
    pub captured_at: NaiveDateTime,
    /// Zero unless several captures landed in the same second.
    pub sequence: u32,
    pub format: SnapshotFormat,
}

/// Snapshot files laid out as
/// `<root>/<job>/active_scans/<job>_<YYYYMMDD_HHMMSS>.<ext>`.
///
/// The directory is the only index: listings are recomputed from a
/// directory scan each time and tolerate files vanishing mid-scan.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    retention: RetentionMode,
}

impl SnapshotStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            root: settings.root,
            retention: settings.retention,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn retention_mode(&self) -> RetentionMode {
        self.retention
    }

    pub fn job_dir(&self, job: &str) -> PathBuf {
        self.root.join(job).join(ACTIVE_SCANS_DIR)
    }

    /// Writes one snapshot and returns its path.
    ///
    /// A capture in the same second as an existing file gets a `_<n>`
    /// suffix rather than overwriting it.
    pub fn write(
        &self,
        job: &str,
        captured_at: NaiveDateTime,
        format: SnapshotFormat,
        content: &str,
    ) -> Result<PathBuf, PersistError> {
        let writer = AtomicFileWriter::new(self.job_dir(job));
        let stem = format!("{job}_{}", captured_at.format(TIMESTAMP_FORMAT));
        let ext = format.extension();

        for sequence in 0..=MAX_SEQUENCE {
            let filename = if sequence == 0 {
                format!("{stem}.{ext}")
            } else {
                format!("{stem}_{sequence}.{ext}")
            };
            match writer.write_new(&filename, content) {
                Ok(path) => return Ok(path),
                Err(PersistError::AlreadyExists(path)) => {
                    scan_debug!("Snapshot {:?} exists, trying next sequence", path);
                }
                Err(err) => return Err(err),
            }
        }
        Err(PersistError::AlreadyExists(
            writer.dir().join(format!("{stem}_{MAX_SEQUENCE}.{ext}")),
        ))
    }

    /// Every snapshot of `job`, oldest first.
    pub fn list(&self, job: &str) -> Result<Vec<SnapshotEntry>, StoreError> {
        let dir = self.job_dir(job);
        let read_dir = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries: Vec<SnapshotEntry> = read_dir
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .filter_map(|e| {
                let name = e.file_name();
                let (captured_at, sequence, format) = parse_file_name(job, name.to_str()?)?;
                Some(SnapshotEntry {
                    path: e.path(),
                    captured_at,
                    sequence,
                    format,
                })
            })
            .collect();
        entries.sort_by_key(|e| (e.captured_at, e.sequence));
        Ok(entries)
    }

    pub fn count(&self, job: &str) -> Result<usize, StoreError> {
        Ok(self.list(job)?.len())
    }

    /// Reads the newest snapshot of `job`.
    pub fn latest(&self, job: &str) -> Result<Snapshot, StoreError> {
        for entry in self.list(job)?.into_iter().rev() {
            match fs::read_to_string(&entry.path) {
                Ok(content) => {
                    return Ok(Snapshot {
                        job_name: job.to_string(),
                        captured_at: entry.captured_at,
                        content,
                        format: entry.format,
                        path: entry.path,
                    })
                }
                // Pruned between the listing and the read.
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(StoreError::NotFound(job.to_string()))
    }

    /// Deletes the oldest snapshots of `job` beyond `limit`.
    ///
    /// Returns how many files were removed; always 0 under
    /// [`RetentionMode::RecordOnly`].
    pub fn enforce_retention(&self, job: &str, limit: usize) -> Result<usize, StoreError> {
        if self.retention == RetentionMode::RecordOnly {
            return Ok(0);
        }
        let entries = self.list(job)?;
        if entries.len() <= limit {
            return Ok(0);
        }

        let excess = entries.len() - limit;
        let mut removed = 0;
        for entry in &entries[..excess] {
            match fs::remove_file(&entry.path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    scan_warn!("Could not prune snapshot {:?}: {}", entry.path, err);
                    return Err(err.into());
                }
            }
        }
        Ok(removed)
    }
}

/// `news_20240101_120000.txt` → (timestamp, 0, Text);
/// `news_20240101_120000_2.json` → (timestamp, 2, Json).
fn parse_file_name(job: &str, file_name: &str) -> Option<(NaiveDateTime, u32, SnapshotFormat)> {
    let rest = file_name.strip_prefix(job)?.strip_prefix('_')?;
    let (stem, ext) = rest.rsplit_once('.')?;
    let format = SnapshotFormat::from_extension(ext)?;

    if stem.len() < TIMESTAMP_LEN || !stem.is_char_boundary(TIMESTAMP_LEN) {
        return None;
    }
    let (timestamp, suffix) = stem.split_at(TIMESTAMP_LEN);
    let captured_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
    let sequence = match suffix {
        "" => 0,
        _ => suffix.strip_prefix('_')?.parse().ok()?,
    };
    Some((captured_at, sequence, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_round_trip_through_parser() {
        let (at, seq, format) = parse_file_name("news", "news_20240101_120000_2.json").unwrap();
        assert_eq!(at.to_string(), "2024-01-01 12:00:00");
        assert_eq!(seq, 2);
        assert_eq!(format, SnapshotFormat::Json);
    }

    #[test]
    fn foreign_files_are_not_snapshots() {
        for name in [
            "news_20240101_120000.md",
            "news_extra_20240101_120000.txt",
            "news_2024.txt",
            "news_20240101_120000_x.txt",
            ".news_20240101_120000.txt.tmp",
            "other_20240101_120000.txt",
        ] {
            assert_eq!(parse_file_name("news", name), None, "{name}");
        }
    }
}
