use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Local;
use scan_logging::{scan_debug, scan_error, scan_info, scan_warn};
use scanner_core::{CaptureMode, JobSpec, ScanState};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::events::EventSink;
use crate::fetch::ContentFetcher;
use crate::format::{FormatRequest, SnapshotFormatter};
use crate::registry::JobCell;
use crate::store::SnapshotStore;
use crate::{FetchError, ScanError, ScanEvent};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Pause between loop iterations; also bounds how long a pause, resume
    /// or capture request takes to be noticed.
    pub poll_interval: Duration,
    /// Let `stop` abort a fetch that is in flight. When off, the running
    /// cycle completes (and persists) before the worker exits.
    pub interrupt_in_flight: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            interrupt_in_flight: true,
        }
    }
}

/// Collaborators shared by every worker the registry starts.
#[derive(Clone)]
pub struct WorkerServices {
    pub fetcher: Arc<dyn ContentFetcher>,
    pub store: Arc<SnapshotStore>,
    pub formatter: Arc<dyn SnapshotFormatter>,
    pub events: Arc<dyn EventSink>,
    pub settings: WorkerSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerMode {
    Active,
    Suspended,
}

/// The registry's grip on one live worker thread.
pub(crate) struct WorkerHandle {
    thread: JoinHandle<()>,
    cancel: CancellationToken,
    mode_tx: watch::Sender<WorkerMode>,
}

impl WorkerHandle {
    pub(crate) fn set_mode(&self, mode: WorkerMode) {
        self.mode_tx.send_replace(mode);
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the thread exits. `Err` carries a panic message.
    pub(crate) fn join(self) -> Result<(), String> {
        self.thread.join().map_err(|payload| panic_message(payload.as_ref()))
    }
}

struct WorkerContext {
    spec: JobSpec,
    generation: u64,
    cell: Arc<JobCell>,
    services: WorkerServices,
    cancel: CancellationToken,
    mode_rx: watch::Receiver<WorkerMode>,
}

/// Starts the capture loop for `spec` on a dedicated thread.
pub(crate) fn spawn(
    spec: JobSpec,
    generation: u64,
    cell: Arc<JobCell>,
    services: WorkerServices,
) -> io::Result<WorkerHandle> {
    let cancel = CancellationToken::new();
    let (mode_tx, mode_rx) = watch::channel(WorkerMode::Active);
    let ctx = WorkerContext {
        spec,
        generation,
        cell,
        services,
        cancel: cancel.clone(),
        mode_rx,
    };
    let thread = thread::Builder::new()
        .name(format!("scan-{}", ctx.spec.name))
        .spawn(move || worker_main(ctx))?;
    Ok(WorkerHandle {
        thread,
        cancel,
        mode_tx,
    })
}

fn worker_main(ctx: WorkerContext) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_worker(&ctx)));
    let error = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(payload) => ScanError::Internal(panic_message(payload.as_ref())),
    };

    let job = ctx.spec.name.clone();
    scan_error!("Worker for {} failed: {}", job, error);
    if let Some(from) = ctx.cell.fail(ctx.generation, &error) {
        ctx.services.events.emit(ScanEvent::StateChanged {
            job: job.clone(),
            from,
            to: ScanState::Stopped,
        });
    }
    ctx.services
        .events
        .emit(ScanEvent::WorkerFailed { job, error });
}

fn run_worker(ctx: &WorkerContext) -> Result<(), ScanError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| ScanError::Internal(format!("worker runtime: {err}")))?;
    runtime.block_on(capture_loop(ctx));
    Ok(())
}

async fn capture_loop(ctx: &WorkerContext) {
    let job = ctx.spec.name.as_str();
    let poll = ctx.services.settings.poll_interval;
    scan_info!("Worker for {} started (generation {})", job, ctx.generation);

    while !ctx.cancel.is_cancelled() {
        let suspended = *ctx.mode_rx.borrow() == WorkerMode::Suspended;
        // Requests that arrive while suspended are dropped, not queued.
        let requested = ctx.cell.take_capture_request();
        let due = ctx.spec.mode == CaptureMode::Continuous || requested;

        if !suspended && due {
            capture_cycle(ctx).await;
            if ctx.cancel.is_cancelled() {
                break;
            }
        }

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            _ = tokio::time::sleep(poll) => {}
        }
    }

    scan_info!("Worker for {} stopped", job);
}

async fn fetch(ctx: &WorkerContext) -> Result<String, FetchError> {
    let fetcher = ctx.services.fetcher.as_ref();
    if !ctx.services.settings.interrupt_in_flight {
        return fetcher.fetch(&ctx.spec.target, &CancellationToken::new()).await;
    }
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => Err(FetchError::cancelled()),
        result = fetcher.fetch(&ctx.spec.target, &ctx.cancel) => result,
    }
}

/// One fetch → record → format → persist → prune pass.
async fn capture_cycle(ctx: &WorkerContext) {
    let job = ctx.spec.name.as_str();
    let events = ctx.services.events.as_ref();

    let content = match fetch(ctx).await {
        Ok(content) => content,
        Err(err) if err.is_cancelled() => {
            scan_debug!("Fetch for {} cancelled", job);
            return;
        }
        Err(err) => {
            scan_warn!("Fetch for {} failed: {}", job, err);
            let error = ScanError::Fetch(err);
            ctx.cell.record_error(&error);
            events.emit(ScanEvent::CaptureFailed {
                job: job.to_string(),
                error,
            });
            return;
        }
    };

    let _persist = ctx.cell.persist_guard();
    if *ctx.mode_rx.borrow() == WorkerMode::Suspended {
        scan_debug!("{} was paused during the fetch; result dropped", job);
        return;
    }

    let captured_at = Local::now().naive_local();
    let empty = content.trim().is_empty();
    let rendered = ctx.services.formatter.render(&FormatRequest {
        job,
        captured_at,
        content: &content,
        format: ctx.spec.format,
        strip_tags: ctx.spec.strip_tags,
    });
    ctx.cell.record_capture(content, captured_at);

    if empty {
        scan_info!("No elements matched {:?} for {}", ctx.spec.target.selector, job);
        events.emit(ScanEvent::NoElements {
            job: job.to_string(),
        });
        return;
    }

    let store = ctx.services.store.as_ref();
    match store.write(job, captured_at, ctx.spec.format, &rendered) {
        Ok(path) => {
            scan_info!("Content for {} saved to {:?}", job, path);
            events.emit(ScanEvent::SnapshotSaved {
                job: job.to_string(),
                path,
                bytes: rendered.len(),
            });
        }
        Err(err) => {
            scan_error!("Failed to save snapshot for {}: {}", job, err);
            let error = ScanError::from(err);
            ctx.cell.record_error(&error);
            events.emit(ScanEvent::CaptureFailed {
                job: job.to_string(),
                error,
            });
            return;
        }
    }

    match store.enforce_retention(job, ctx.spec.retention_limit) {
        Ok(0) => {}
        Ok(removed) => {
            scan_debug!("Pruned {} old snapshot(s) of {}", removed, job);
            events.emit(ScanEvent::SnapshotsPruned {
                job: job.to_string(),
                removed,
            });
        }
        Err(err) => {
            scan_warn!("Retention for {} failed: {}", job, err);
            let error = ScanError::Persistence(err.to_string());
            ctx.cell.record_error(&error);
            events.emit(ScanEvent::CaptureFailed {
                job: job.to_string(),
                error,
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker panicked".to_string()
    }
}
