use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use scan_logging::{scan_debug, scan_info, scan_trace};
use scanner_core::ConfigurationError;

use crate::registry::lock;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Resolution of the tick loop. A task may fire up to one tick late.
    pub tick: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
        }
    }
}

/// Work fired by the scheduler. Must not call back into the scheduler.
pub type TaskAction = Box<dyn FnMut() + Send>;

struct Task {
    name: String,
    period: Duration,
    last_fire: Instant,
    action: TaskAction,
}

struct Shared {
    tasks: Mutex<Vec<Task>>,
    ticks: AtomicU64,
}

impl Shared {
    fn tick_at(&self, now: Instant) -> Vec<String> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;

        let mut fired = Vec::new();
        for task in lock(&self.tasks).iter_mut() {
            if now.saturating_duration_since(task.last_fire) >= task.period {
                scan_trace!("Tick {}: firing {}", tick, task.name);
                (task.action)();
                task.last_fire = now;
                fired.push(task.name.clone());
            }
        }
        fired
    }
}

/// Fires named periodic tasks from a single tick loop.
///
/// The loop decides *when*; what a task does is up to its action.
pub struct Scheduler {
    settings: SchedulerSettings,
    shared: Arc<Shared>,
    stop_tx: Mutex<Option<mpsc::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Creates a scheduler without starting its thread; see [`Scheduler::start`].
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            settings,
            shared: Arc::new(Shared {
                tasks: Mutex::new(Vec::new()),
                ticks: AtomicU64::new(0),
            }),
            stop_tx: Mutex::new(None),
            thread: Mutex::new(None),
        }
    }

    /// Registers `action` to fire every `period`, first one period from now.
    pub fn every(
        &self,
        name: impl Into<String>,
        period: Duration,
        action: TaskAction,
    ) -> Result<(), ConfigurationError> {
        let name = name.into();
        if period.is_zero() {
            return Err(ConfigurationError::InvalidInterval(0));
        }
        let mut tasks = lock(&self.shared.tasks);
        if tasks.iter().any(|task| task.name == name) {
            return Err(ConfigurationError::DuplicateName(name));
        }
        scan_debug!("Scheduled {} every {:?}", name, period);
        tasks.push(Task {
            name,
            period,
            last_fire: Instant::now(),
            action,
        });
        Ok(())
    }

    /// Removes the task called `name`. Returns whether one existed.
    pub fn cancel(&self, name: &str) -> bool {
        let mut tasks = lock(&self.shared.tasks);
        let before = tasks.len();
        tasks.retain(|task| task.name != name);
        tasks.len() != before
    }

    pub fn task_names(&self) -> Vec<String> {
        lock(&self.shared.tasks)
            .iter()
            .map(|task| task.name.clone())
            .collect()
    }

    /// Runs one tick as of `now` and returns the names of the tasks fired.
    pub fn tick_at(&self, now: Instant) -> Vec<String> {
        self.shared.tick_at(now)
    }

    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.thread)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Starts the tick thread. Calling it on a started scheduler does nothing.
    pub fn start(&self) -> std::io::Result<()> {
        let mut thread_slot = lock(&self.thread);
        if thread_slot.is_some() {
            return Ok(());
        }
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let tick = self.settings.tick;

        let handle = thread::Builder::new()
            .name("scan-scheduler".to_string())
            .spawn(move || {
                scan_info!("Scheduler started, tick {:?}", tick);
                // Any message, or the sender going away, ends the loop.
                while let Err(mpsc::RecvTimeoutError::Timeout) = stop_rx.recv_timeout(tick) {
                    shared.tick_at(Instant::now());
                }
                scan_info!("Scheduler stopped");
            })?;

        *lock(&self.stop_tx) = Some(stop_tx);
        *thread_slot = Some(handle);
        Ok(())
    }

    /// Stops the tick thread and waits for it. Registered tasks are kept.
    pub fn shutdown(&self) {
        drop(lock(&self.stop_tx).take());
        if let Some(handle) = lock(&self.thread).take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
