use chrono::NaiveDateTime;

use crate::{CaptureMode, ScanState, SnapshotFormat, TimeUnit};

/// One row of the job listing handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub name: String,
    pub state: ScanState,
    pub interval: u64,
    pub unit: TimeUnit,
    pub retention_limit: usize,
    pub format: SnapshotFormat,
    pub mode: CaptureMode,
    pub captures: u64,
    pub last_capture: Option<NaiveDateTime>,
    pub last_error: Option<String>,
}

impl JobRowView {
    /// `"news - Running"`, the label the job list shows.
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.state)
    }
}
