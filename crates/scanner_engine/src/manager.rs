use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use scan_logging::{scan_debug, scan_info, scan_trace, scan_warn};
use scanner_core::{
    compare, diff_lines, find_matches, unified_text, CaptureMode, ConfigurationError,
    DiffOutcome, DiffRecord, JobRowView, JobSpec, ScanState, SearchMatch, SearchSession,
    Transition,
};

use crate::events::EventSink;
use crate::export::{matching_lines, write_export, ExportError};
use crate::fetch::{FetchSettings, ReqwestFetcher};
use crate::format::{DefaultFormatter, FormatRequest};
use crate::parse::{parse_content, ParseKind};
use crate::persist::ensure_output_dir;
use crate::preview::{preview, MAX_PREVIEW_CHARS};
use crate::registry::{lock, CapturedContent, RegistryError, ScanRegistry};
use crate::scheduler::{Scheduler, SchedulerSettings, TaskAction};
use crate::store::{SnapshotStore, StoreError, StoreSettings};
use crate::worker::{WorkerServices, WorkerSettings};
use crate::{ScanError, Snapshot};

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub fetch: FetchSettings,
    pub worker: WorkerSettings,
    pub scheduler: SchedulerSettings,
    pub store: StoreSettings,
}

/// Command surface over the registry, the scheduler and the store.
///
/// Every command names its job explicitly; search sessions are handed back
/// to the caller instead of living here.
pub struct ScanManager {
    registry: Arc<ScanRegistry>,
    scheduler: Scheduler,
    store: Arc<SnapshotStore>,
    /// Continuous jobs the operator stopped; the scheduler leaves them alone
    /// until the next explicit `run`.
    held: Arc<Mutex<BTreeSet<String>>>,
}

impl ScanManager {
    /// HTTP fetching, the default formatter and a started scheduler.
    pub fn new(settings: EngineSettings, events: Arc<dyn EventSink>) -> Result<Self, ScanError> {
        let services = WorkerServices {
            fetcher: Arc::new(ReqwestFetcher::new(settings.fetch)),
            store: Arc::new(SnapshotStore::new(settings.store)),
            formatter: Arc::new(DefaultFormatter),
            events,
            settings: settings.worker,
        };
        Self::with_services(services, settings.scheduler)
    }

    pub fn with_services(
        services: WorkerServices,
        scheduler: SchedulerSettings,
    ) -> Result<Self, ScanError> {
        let store = Arc::clone(&services.store);
        let manager = Self {
            registry: Arc::new(ScanRegistry::new(services)),
            scheduler: Scheduler::new(scheduler),
            store,
            held: Arc::new(Mutex::new(BTreeSet::new())),
        };
        manager
            .scheduler
            .start()
            .map_err(|err| ScanError::Internal(format!("start scheduler: {err}")))?;
        Ok(manager)
    }

    pub fn registry(&self) -> &ScanRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Registers a job in `Stopped` and its periodic task.
    pub fn schedule_job(&self, spec: JobSpec) -> Result<(), ConfigurationError> {
        let name = spec.name.clone();
        let period = spec.period();
        let mode = spec.mode;
        self.registry.register(spec)?;

        let dir = self.store.job_dir(&name);
        if let Err(err) = ensure_output_dir(&dir) {
            scan_warn!("Could not create {:?} for {}: {}", dir, name, err);
        }

        let action = self.task_action(&name, mode);
        self.scheduler.every(name.clone(), period, action)?;
        scan_info!("Job {} scheduled every {:?} ({:?})", name, period, mode);
        Ok(())
    }

    fn task_action(&self, name: &str, mode: CaptureMode) -> TaskAction {
        let registry = Arc::downgrade(&self.registry);
        let name = name.to_string();
        match mode {
            CaptureMode::Scheduled => Box::new(move || {
                let Some(registry) = registry.upgrade() else {
                    return;
                };
                match registry.request_capture(&name) {
                    Ok(true) => scan_debug!("Capture requested for {}", name),
                    Ok(false) => scan_trace!("{} is not running; tick skipped", name),
                    Err(err) => scan_warn!("Capture request for {} failed: {}", name, err),
                }
            }),
            CaptureMode::Continuous => {
                let held = Arc::clone(&self.held);
                Box::new(move || {
                    let Some(registry) = registry.upgrade() else {
                        return;
                    };
                    let stopped = lock(&held);
                    if stopped.contains(&name) {
                        return;
                    }
                    if let Err(err) = registry.run(&name) {
                        scan_warn!("Could not keep {} running: {}", name, err);
                    }
                })
            }
        }
    }

    pub fn run(&self, name: &str) -> Result<Transition, RegistryError> {
        let result = self.registry.run(name)?;
        lock(&self.held).remove(name);
        Ok(result)
    }

    pub fn pause(&self, name: &str) -> Result<Transition, RegistryError> {
        self.registry.pause(name)
    }

    pub fn resume(&self, name: &str) -> Result<Transition, RegistryError> {
        self.registry.resume(name)
    }

    /// Stops the job and waits for its worker to exit.
    pub fn stop(&self, name: &str) -> Result<Transition, RegistryError> {
        if !self.registry.contains(name) {
            return Err(RegistryError::UnknownJob(name.to_string()));
        }
        lock(&self.held).insert(name.to_string());
        self.registry.stop(name)
    }

    /// Asks a running job for one immediate capture.
    pub fn capture_now(&self, name: &str) -> Result<bool, RegistryError> {
        self.registry.request_capture(name)
    }

    pub fn job_state(&self, name: &str) -> Result<ScanState, RegistryError> {
        self.registry.state(name)
    }

    pub fn list_jobs(&self) -> Vec<JobRowView> {
        self.registry.list_jobs()
    }

    pub fn latest_snapshot(&self, name: &str) -> Result<Snapshot, StoreError> {
        self.store.latest(name)
    }

    /// The newest snapshot, cut down for display.
    pub fn snapshot_preview(&self, name: &str) -> Result<String, StoreError> {
        let snapshot = self.store.latest(name)?;
        Ok(preview(&snapshot.content, MAX_PREVIEW_CHARS))
    }

    pub fn current_content(&self, name: &str) -> Result<CapturedContent, RegistryError> {
        self.registry.content(name)
    }

    pub fn diff(&self, previous: &str, current: &str) -> DiffRecord {
        diff_lines(previous, current)
    }

    /// Compares the job's last two captures.
    pub fn diff_job(&self, name: &str) -> Result<DiffOutcome, RegistryError> {
        let content = self.registry.content(name)?;
        Ok(match content.current.as_deref() {
            None => DiffOutcome::NoBaseline,
            Some(current) => compare(content.previous.as_deref(), current),
        })
    }

    /// Unified diff text of the job's last two captures, if it has two.
    pub fn unified_diff_job(&self, name: &str) -> Result<Option<String>, RegistryError> {
        let content = self.registry.content(name)?;
        Ok(match (content.previous, content.current) {
            (Some(previous), Some(current)) => Some(unified_text(&previous, &current)),
            _ => None,
        })
    }

    pub fn search(&self, text: &str, term: &str) -> Result<Vec<SearchMatch>, ConfigurationError> {
        find_matches(text, term)
    }

    /// A search over the job's current content; an uncaptured job has none.
    pub fn search_session(&self, name: &str, term: &str) -> Result<SearchSession, RegistryError> {
        let content = self.registry.content(name)?;
        let text = content.current.unwrap_or_default();
        Ok(SearchSession::new(&text, term)?)
    }

    /// The job's current capture re-viewed as `kind`; `None` before any
    /// non-empty capture.
    pub fn parse_job(&self, name: &str, kind: ParseKind) -> Result<Option<String>, RegistryError> {
        let content = self.registry.content(name)?;
        Ok(content
            .current
            .filter(|text| !text.trim().is_empty())
            .map(|text| parse_content(&text, kind)))
    }

    /// Writes the job's current capture to `path` in the job's format.
    pub fn export_job(&self, name: &str, path: &Path) -> Result<PathBuf, ExportError> {
        let content = self.registry.content(name)?.current.unwrap_or_default();
        self.export(name, &content, path)
    }

    /// Writes the lines of the job's current capture that match `term`.
    pub fn export_search(&self, name: &str, term: &str, path: &Path) -> Result<PathBuf, ExportError> {
        let content = self.registry.content(name)?.current.unwrap_or_default();
        let lines = matching_lines(&content, term)?;
        self.export(name, &lines, path)
    }

    fn export(&self, name: &str, content: &str, path: &Path) -> Result<PathBuf, ExportError> {
        if content.trim().is_empty() {
            return Err(ExportError::NothingToExport(name.to_string()));
        }
        let spec = self.registry.spec(name)?;
        let request = FormatRequest {
            job: name,
            captured_at: Local::now().naive_local(),
            content,
            format: spec.format,
            strip_tags: spec.strip_tags,
        };
        let written = write_export(self.registry.services().formatter.as_ref(), &request, path)?;
        scan_info!("Exported {} to {:?}", name, written);
        Ok(written)
    }

    /// Stops the scheduler, then every job.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.registry.stop_all();
        scan_info!("Scan manager shut down");
    }
}

impl Drop for ScanManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
