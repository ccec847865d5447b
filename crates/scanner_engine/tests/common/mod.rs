#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

use scanner_core::{CaptureMode, JobSpec, ScanTarget, TimeUnit};
use scanner_engine::{
    ContentFetcher, DefaultFormatter, EventSink, FetchError, RetentionMode, ScanEvent,
    SnapshotStore, StoreSettings, WorkerServices, WorkerSettings,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const POLL: Duration = Duration::from_millis(20);

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scan_logging::initialize_for_tests);
}

/// Returns a different page on every call: `<h2>capture N</h2>`.
#[derive(Default)]
pub struct CountingFetcher {
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ContentFetcher for CountingFetcher {
    async fn fetch(
        &self,
        _target: &ScanTarget,
        _cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("<h2>capture {n}</h2>\n\n"))
    }
}

/// Sleeps for `delay` and ignores the token, like a fetcher stuck in IO.
pub struct SlowFetcher {
    pub delay: Duration,
    pub started: AtomicBool,
}

impl SlowFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl ContentFetcher for SlowFetcher {
    async fn fetch(
        &self,
        _target: &ScanTarget,
        _cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        self.started.store(true, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok("<h2>slow</h2>\n\n".to_string())
    }
}

/// Always returns the same content.
pub struct FixedFetcher(pub String);

#[async_trait::async_trait]
impl ContentFetcher for FixedFetcher {
    async fn fetch(
        &self,
        _target: &ScanTarget,
        _cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        Ok(self.0.clone())
    }
}

pub struct PanickingFetcher;

#[async_trait::async_trait]
impl ContentFetcher for PanickingFetcher {
    async fn fetch(
        &self,
        _target: &ScanTarget,
        _cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        panic!("boom");
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ScanEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ScanEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ScanEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub temp: TempDir,
    pub events: Arc<RecordingSink>,
    pub store: Arc<SnapshotStore>,
    pub services: WorkerServices,
}

pub fn harness(fetcher: Arc<dyn ContentFetcher>) -> Harness {
    let settings = WorkerSettings {
        poll_interval: POLL,
        interrupt_in_flight: true,
    };
    harness_with(fetcher, settings, RetentionMode::Enforce)
}

pub fn harness_with(
    fetcher: Arc<dyn ContentFetcher>,
    settings: WorkerSettings,
    retention: RetentionMode,
) -> Harness {
    init_logging();
    let temp = TempDir::new().unwrap();
    let events = Arc::new(RecordingSink::default());
    let store = Arc::new(SnapshotStore::new(StoreSettings {
        root: temp.path().to_path_buf(),
        retention,
    }));
    let services = WorkerServices {
        fetcher,
        store: Arc::clone(&store),
        formatter: Arc::new(DefaultFormatter),
        events: events.clone(),
        settings,
    };
    Harness {
        temp,
        events,
        store,
        services,
    }
}

pub fn job(name: &str, mode: CaptureMode) -> JobSpec {
    JobSpec::new(name, ScanTarget::new("https://example.com/news", "h2"))
        .every(1, TimeUnit::Seconds)
        .with_mode(mode)
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
