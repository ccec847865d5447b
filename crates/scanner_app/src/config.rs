//! Jobs and engine settings declared in a RON file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::LevelFilter;
use scan_logging::{scan_info, LogDestination, DEFAULT_LOG_FILE};
use scanner_core::{CaptureMode, JobSpec, ScanTarget, SnapshotFormat, TimeUnit};
use scanner_engine::{
    AtomicFileWriter, EngineSettings, FetchSettings, RetentionMode, SchedulerSettings,
    StoreSettings, WorkerSettings,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "./scans.ron";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PersistedMode {
    #[default]
    Scheduled,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PersistedRetention {
    #[default]
    Enforce,
    RecordOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PersistedLog {
    Terminal,
    File,
    #[default]
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedJob {
    pub name: String,
    pub url: String,
    pub selector: String,
    pub interval: u64,
    pub unit: String,
    pub retention: usize,
    pub format: String,
    pub strip_tags: bool,
    pub mode: PersistedMode,
    /// Start the job as soon as it is scheduled.
    pub autostart: bool,
}

impl Default for PersistedJob {
    fn default() -> Self {
        Self::from_spec(&JobSpec::new("", ScanTarget::new("", "")), false)
    }
}

impl PersistedJob {
    pub fn from_spec(spec: &JobSpec, autostart: bool) -> Self {
        Self {
            name: spec.name.clone(),
            url: spec.target.url.clone(),
            selector: spec.target.selector.clone(),
            interval: spec.interval,
            unit: spec.unit.to_string(),
            retention: spec.retention_limit,
            format: spec.format.extension().to_string(),
            strip_tags: spec.strip_tags,
            mode: match spec.mode {
                CaptureMode::Scheduled => PersistedMode::Scheduled,
                CaptureMode::Continuous => PersistedMode::Continuous,
            },
            autostart,
        }
    }

    /// Builds the job spec. Field values are checked when the job is scheduled.
    pub fn to_spec(&self) -> Result<JobSpec> {
        let unit = TimeUnit::from_str(&self.unit)
            .map_err(|err| anyhow!("job {:?}: {}", self.name, err))?;
        let format = SnapshotFormat::from_str(&self.format)
            .map_err(|err| anyhow!("job {:?}: {}", self.name, err))?;
        let mode = match self.mode {
            PersistedMode::Scheduled => CaptureMode::Scheduled,
            PersistedMode::Continuous => CaptureMode::Continuous,
        };
        Ok(
            JobSpec::new(self.name.clone(), ScanTarget::new(&self.url, &self.selector))
                .every(self.interval, unit)
                .keep(self.retention)
                .with_format(format)
                .with_strip_tags(self.strip_tags)
                .with_mode(mode),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedConfig {
    pub output_root: PathBuf,
    pub retention: PersistedRetention,
    pub poll_interval_ms: u64,
    pub tick_ms: u64,
    pub interrupt_in_flight: bool,
    pub request_timeout_secs: u64,
    pub log: PersistedLog,
    pub log_file: PathBuf,
    pub log_level: String,
    pub jobs: Vec<PersistedJob>,
}

impl Default for PersistedConfig {
    fn default() -> Self {
        let worker = WorkerSettings::default();
        let scheduler = SchedulerSettings::default();
        let fetch = FetchSettings::default();
        Self {
            output_root: PathBuf::from("."),
            retention: PersistedRetention::Enforce,
            poll_interval_ms: worker.poll_interval.as_millis() as u64,
            tick_ms: scheduler.tick.as_millis() as u64,
            interrupt_in_flight: worker.interrupt_in_flight,
            request_timeout_secs: fetch.request_timeout.as_secs(),
            log: PersistedLog::Both,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_level: "info".to_string(),
            jobs: Vec::new(),
        }
    }
}

impl PersistedConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            fetch: FetchSettings {
                request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
                ..FetchSettings::default()
            },
            worker: WorkerSettings {
                poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
                interrupt_in_flight: self.interrupt_in_flight,
            },
            scheduler: SchedulerSettings {
                tick: Duration::from_millis(self.tick_ms.max(1)),
            },
            store: StoreSettings {
                root: self.output_root.clone(),
                retention: match self.retention {
                    PersistedRetention::Enforce => RetentionMode::Enforce,
                    PersistedRetention::RecordOnly => RetentionMode::RecordOnly,
                },
            },
        }
    }

    pub fn log_destination(&self) -> LogDestination {
        match self.log {
            PersistedLog::Terminal => LogDestination::Terminal,
            PersistedLog::File => LogDestination::File(self.log_file.clone()),
            PersistedLog::Both => LogDestination::Both(self.log_file.clone()),
        }
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .with_context(|| format!("invalid log level {:?}", self.log_level))
    }
}

/// Reads the config at `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<PersistedConfig> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(PersistedConfig::default());
        }
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    ron::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

pub fn save_config(path: &Path, config: &PersistedConfig) -> Result<()> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(config, pretty).context("serializing config")?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("config path {} has no file name", path.display()))?;
    AtomicFileWriter::new(dir)
        .write(filename, &content)
        .with_context(|| format!("writing {}", path.display()))?;
    scan_info!("Saved {} job(s) to {:?}", config.jobs.len(), path);
    Ok(())
}
