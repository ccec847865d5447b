//! Scanner core: job definitions, the job state machine, and the pure diff and
//! search engines that operate on captured text.
mod diff;
mod error;
mod job;
mod search;
mod state;
mod view_model;

pub use diff::{compare, diff_lines, unified_text, DiffLine, DiffOutcome, DiffRecord, LineTag};
pub use error::ConfigurationError;
pub use job::{validate_job_name, CaptureMode, JobSpec, ScanTarget, SnapshotFormat, TimeUnit};
pub use search::{find_matches, SearchMatch, SearchSession};
pub use state::{transition, Effect, ScanCommand, ScanState, Transition};
pub use view_model::JobRowView;
