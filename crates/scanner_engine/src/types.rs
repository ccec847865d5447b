use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use scanner_core::{ConfigurationError, ScanState, SnapshotFormat};

use crate::persist::PersistError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "fetch cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidSelector,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidSelector => write!(f, "invalid selector"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "decode error"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Every error a scan can surface, by category.
///
/// Fetch and persistence errors are advisory: the worker keeps going.
/// Internal errors end the worker and force the job to `Stopped`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScanError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("internal worker failure: {0}")]
    Internal(String),
}

impl From<PersistError> for ScanError {
    fn from(err: PersistError) -> Self {
        ScanError::Persistence(err.to_string())
    }
}

/// One captured result as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub job_name: String,
    pub captured_at: NaiveDateTime,
    pub content: String,
    pub format: SnapshotFormat,
    pub path: PathBuf,
}

/// Advisory notifications emitted by workers and the registry.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    StateChanged {
        job: String,
        from: ScanState,
        to: ScanState,
    },
    SnapshotSaved {
        job: String,
        path: PathBuf,
        bytes: usize,
    },
    /// The fetch succeeded but the selector matched nothing; nothing was saved.
    NoElements { job: String },
    SnapshotsPruned { job: String, removed: usize },
    CaptureFailed { job: String, error: ScanError },
    WorkerFailed { job: String, error: ScanError },
}

impl ScanEvent {
    pub fn job(&self) -> &str {
        match self {
            ScanEvent::StateChanged { job, .. }
            | ScanEvent::SnapshotSaved { job, .. }
            | ScanEvent::NoElements { job }
            | ScanEvent::SnapshotsPruned { job, .. }
            | ScanEvent::CaptureFailed { job, .. }
            | ScanEvent::WorkerFailed { job, .. } => job,
        }
    }
}
