//! Scanner engine: fetching, snapshot persistence and the job runtime.
mod decode;
mod events;
mod export;
mod extract;
mod fetch;
mod format;
mod manager;
mod parse;
mod persist;
mod preview;
mod registry;
mod scheduler;
mod store;
mod types;
mod worker;

pub use decode::{decode_page, DecodeError, DecodedPage};
pub use events::{ChannelEventSink, EventSink, NullEventSink};
pub use export::{export_path, matching_lines, write_export, ExportError};
pub use extract::{extract_elements, parse_selector, strip_tags};
pub use fetch::{ContentFetcher, FetchSettings, ReqwestFetcher};
pub use format::{DefaultFormatter, FormatRequest, SnapshotFormatter};
pub use manager::{EngineSettings, ScanManager};
pub use parse::{parse_content, ParseKind};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use preview::{preview, MAX_PREVIEW_CHARS};
pub use registry::{CapturedContent, RegistryError, ScanRegistry};
pub use scheduler::{Scheduler, SchedulerSettings, TaskAction};
pub use store::{RetentionMode, SnapshotEntry, SnapshotStore, StoreError, StoreSettings};
pub use types::{FailureKind, FetchError, ScanError, ScanEvent, Snapshot};
pub use worker::{WorkerServices, WorkerSettings};
