use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDateTime;
use scan_logging::{scan_debug, scan_error, scan_info, scan_warn};
use scanner_core::{
    transition, ConfigurationError, Effect, JobRowView, JobSpec, ScanCommand, ScanState,
    Transition,
};
use thiserror::Error;

use crate::extract::parse_selector;
use crate::worker::{self, WorkerHandle, WorkerMode, WorkerServices};
use crate::{ScanError, ScanEvent};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown job {0:?}")]
    UnknownJob(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// The last two captures held in memory for a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedContent {
    pub previous: Option<String>,
    pub current: Option<String>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct JobRecord {
    spec: JobSpec,
    state: ScanState,
    /// Bumped on every spawn so a dying worker cannot touch a newer run.
    generation: u64,
    stopping: bool,
    worker: Option<WorkerHandle>,
    content: CapturedContent,
    captures: u64,
    last_capture: Option<NaiveDateTime>,
    last_error: Option<String>,
}

/// Shared between the registry and the job's worker.
///
/// `transition` serializes commands on the job and is held across a stop's
/// join. `record` is only held briefly. `persist` covers a worker's
/// record-and-write step and is always taken before `record`.
pub(crate) struct JobCell {
    transition: Mutex<()>,
    persist: Mutex<()>,
    record: Mutex<JobRecord>,
    capture_requested: AtomicBool,
}

impl JobCell {
    fn new(spec: JobSpec) -> Self {
        Self {
            transition: Mutex::new(()),
            persist: Mutex::new(()),
            record: Mutex::new(JobRecord {
                spec,
                state: ScanState::Stopped,
                generation: 0,
                stopping: false,
                worker: None,
                content: CapturedContent::default(),
                captures: 0,
                last_capture: None,
                last_error: None,
            }),
            capture_requested: AtomicBool::new(false),
        }
    }

    pub(crate) fn take_capture_request(&self) -> bool {
        self.capture_requested.swap(false, Ordering::AcqRel)
    }

    /// Held while a finished fetch is recorded and written. A suspend waits
    /// for it, so nothing is persisted once `pause` has returned.
    pub(crate) fn persist_guard(&self) -> MutexGuard<'_, ()> {
        lock(&self.persist)
    }

    pub(crate) fn record_capture(&self, content: String, captured_at: NaiveDateTime) {
        let mut record = lock(&self.record);
        record.content.previous = record.content.current.take();
        record.content.current = Some(content);
        record.captures += 1;
        record.last_capture = Some(captured_at);
        record.last_error = None;
    }

    pub(crate) fn record_error(&self, error: &ScanError) {
        lock(&self.record).last_error = Some(error.to_string());
    }

    /// Forces the job to `Stopped` after its worker died on its own.
    ///
    /// Returns the state left behind, or `None` when the failing worker is
    /// stale or a stop is already joining it.
    pub(crate) fn fail(&self, generation: u64, error: &ScanError) -> Option<ScanState> {
        let mut record = lock(&self.record);
        if record.generation != generation {
            return None;
        }
        record.last_error = Some(error.to_string());
        if record.stopping || record.worker.is_none() {
            return None;
        }
        let from = record.state;
        record.state = ScanState::Stopped;
        // The handle belongs to the thread running this code; dropping it
        // detaches that thread.
        record.worker = None;
        Some(from)
    }

    fn row(&self) -> JobRowView {
        let record = lock(&self.record);
        JobRowView {
            name: record.spec.name.clone(),
            state: record.state,
            interval: record.spec.interval,
            unit: record.spec.unit,
            retention_limit: record.spec.retention_limit,
            format: record.spec.format,
            mode: record.spec.mode,
            captures: record.captures,
            last_capture: record.last_capture,
            last_error: record.last_error.clone(),
        }
    }
}

/// Owns every job and its at-most-one worker.
///
/// Commands on one job are linearizable; commands on different jobs never
/// wait for each other.
pub struct ScanRegistry {
    jobs: Mutex<BTreeMap<String, Arc<JobCell>>>,
    services: WorkerServices,
}

impl ScanRegistry {
    pub fn new(services: WorkerServices) -> Self {
        Self {
            jobs: Mutex::new(BTreeMap::new()),
            services,
        }
    }

    pub fn services(&self) -> &WorkerServices {
        &self.services
    }

    /// Adds a job in `Stopped`. Nothing is registered when validation fails.
    pub fn register(&self, spec: JobSpec) -> Result<(), ConfigurationError> {
        spec.validate()?;
        parse_selector(&spec.target.selector)?;

        let mut jobs = lock(&self.jobs);
        if jobs.contains_key(&spec.name) {
            return Err(ConfigurationError::DuplicateName(spec.name));
        }
        scan_info!("Registered job {}", spec.name);
        jobs.insert(spec.name.clone(), Arc::new(JobCell::new(spec)));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.jobs).contains_key(name)
    }

    pub fn spec(&self, name: &str) -> Result<JobSpec, RegistryError> {
        Ok(lock(&self.cell(name)?.record).spec.clone())
    }

    pub fn state(&self, name: &str) -> Result<ScanState, RegistryError> {
        Ok(lock(&self.cell(name)?.record).state)
    }

    pub fn run(&self, name: &str) -> Result<Transition, RegistryError> {
        self.apply(name, ScanCommand::Run)
    }

    pub fn pause(&self, name: &str) -> Result<Transition, RegistryError> {
        self.apply(name, ScanCommand::Pause)
    }

    pub fn resume(&self, name: &str) -> Result<Transition, RegistryError> {
        self.apply(name, ScanCommand::Resume)
    }

    /// Stops the job and returns once its worker has exited.
    pub fn stop(&self, name: &str) -> Result<Transition, RegistryError> {
        self.apply(name, ScanCommand::Stop)
    }

    pub fn apply(&self, name: &str, command: ScanCommand) -> Result<Transition, RegistryError> {
        let cell = self.cell(name)?;
        let _serial = lock(&cell.transition);

        let (result, from, to) = {
            let mut record = lock(&cell.record);
            let result = transition(record.state, command);
            let Transition::Applied { from, to, effect } = result else {
                scan_debug!("Ignored {} on {} in state {}", command, name, record.state);
                return Ok(result);
            };

            match effect {
                Effect::SpawnWorker => {
                    let generation = record.generation + 1;
                    let handle = worker::spawn(
                        record.spec.clone(),
                        generation,
                        Arc::clone(&cell),
                        self.services.clone(),
                    )
                    .map_err(|err| {
                        scan_error!("Could not start worker for {}: {}", name, err);
                        RegistryError::Internal(format!("spawn worker: {err}"))
                    })?;
                    cell.capture_requested.store(false, Ordering::Release);
                    record.generation = generation;
                    record.worker = Some(handle);
                    record.state = to;
                    record.last_error = None;
                }
                Effect::SuspendWorker | Effect::ResumeWorker => {
                    let mode = if effect == Effect::SuspendWorker {
                        WorkerMode::Suspended
                    } else {
                        WorkerMode::Active
                    };
                    if let Some(handle) = &record.worker {
                        handle.set_mode(mode);
                    }
                    record.state = to;
                }
                Effect::CancelWorker => {
                    // The state stays visible as `from` until the worker is gone.
                    record.stopping = true;
                    let handle = record.worker.take();
                    drop(record);

                    let joined = match handle {
                        Some(handle) => {
                            handle.cancel();
                            handle.join()
                        }
                        None => Ok(()),
                    };

                    let mut record = lock(&cell.record);
                    record.stopping = false;
                    record.state = to;
                    if let Err(msg) = joined {
                        scan_warn!("Worker for {} panicked while stopping: {}", name, msg);
                        record.last_error = Some(msg);
                    }
                }
            }
            (result, from, to)
        };

        if let Transition::Applied {
            effect: Effect::SuspendWorker,
            ..
        } = result
        {
            // Waits out a write that started before the mode change.
            drop(cell.persist_guard());
        }

        scan_info!("Job {}: {} -> {}", name, from, to);
        self.services.events.emit(ScanEvent::StateChanged {
            job: name.to_string(),
            from,
            to,
        });
        Ok(result)
    }

    /// Asks a running worker for one capture on its next poll.
    ///
    /// Returns `false` (and drops the request) unless the job is `Running`.
    pub fn request_capture(&self, name: &str) -> Result<bool, RegistryError> {
        let cell = self.cell(name)?;
        let record = lock(&cell.record);
        if record.state != ScanState::Running {
            return Ok(false);
        }
        cell.capture_requested.store(true, Ordering::Release);
        Ok(true)
    }

    /// Every job, ordered by name.
    pub fn list_jobs(&self) -> Vec<JobRowView> {
        self.cells().iter().map(|cell| cell.row()).collect()
    }

    pub fn content(&self, name: &str) -> Result<CapturedContent, RegistryError> {
        Ok(lock(&self.cell(name)?.record).content.clone())
    }

    /// Workers whose thread is still alive.
    pub fn live_workers(&self) -> usize {
        self.cells()
            .iter()
            .filter(|cell| {
                lock(&cell.record)
                    .worker
                    .as_ref()
                    .is_some_and(|handle| !handle.is_finished())
            })
            .count()
    }

    /// Stops every job, waiting for each worker to exit.
    pub fn stop_all(&self) {
        let names: Vec<String> = lock(&self.jobs).keys().cloned().collect();
        for name in names {
            if let Err(err) = self.stop(&name) {
                scan_warn!("Stopping {} failed: {}", name, err);
            }
        }
    }

    fn cell(&self, name: &str) -> Result<Arc<JobCell>, RegistryError> {
        lock(&self.jobs)
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownJob(name.to_string()))
    }

    fn cells(&self) -> Vec<Arc<JobCell>> {
        lock(&self.jobs).values().cloned().collect()
    }
}

impl Drop for ScanRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}
