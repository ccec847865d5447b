use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::ConfigurationError;

/// Unit of a job's scheduling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeUnit {
    Seconds,
    #[default]
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn seconds(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 60 * 60,
            TimeUnit::Days => 24 * 60 * 60,
        }
    }

    pub fn period(self, interval: u64) -> Duration {
        Duration::from_secs(interval.saturating_mul(self.seconds()))
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        };
        f.write_str(label)
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Ok(TimeUnit::Seconds),
            "m" | "min" | "minute" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hour" | "hours" => Ok(TimeUnit::Hours),
            "d" | "day" | "days" => Ok(TimeUnit::Days),
            other => Err(format!("unknown time unit {other:?}")),
        }
    }
}

/// Encoding a snapshot is written in; also decides the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SnapshotFormat {
    #[default]
    Text,
    Csv,
    Json,
}

impl SnapshotFormat {
    pub const ALL: [SnapshotFormat; 3] =
        [SnapshotFormat::Text, SnapshotFormat::Csv, SnapshotFormat::Json];

    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Text => "txt",
            SnapshotFormat::Csv => "csv",
            SnapshotFormat::Json => "json",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(ext))
    }
}

impl FromStr for SnapshotFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        match trimmed.to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(SnapshotFormat::Text),
            other => SnapshotFormat::from_extension(other)
                .ok_or_else(|| format!("unknown snapshot format {other:?}")),
        }
    }
}

/// How a running worker decides when to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Capture once each time the scheduler reports the job as due.
    #[default]
    Scheduled,
    /// Capture on every poll iteration of the worker loop.
    Continuous,
}

/// Locator and selector handed to the content fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub url: String,
    pub selector: String,
}

impl ScanTarget {
    pub fn new(url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selector: selector.into(),
        }
    }
}

/// Everything the operator declares when scheduling a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: String,
    pub target: ScanTarget,
    pub interval: u64,
    pub unit: TimeUnit,
    pub retention_limit: usize,
    pub format: SnapshotFormat,
    /// Persist element text only, without markup.
    pub strip_tags: bool,
    pub mode: CaptureMode,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, target: ScanTarget) -> Self {
        Self {
            name: name.into(),
            target,
            interval: 5,
            unit: TimeUnit::Minutes,
            retention_limit: 10,
            format: SnapshotFormat::Text,
            strip_tags: false,
            mode: CaptureMode::Scheduled,
        }
    }

    pub fn every(mut self, interval: u64, unit: TimeUnit) -> Self {
        self.interval = interval;
        self.unit = unit;
        self
    }

    pub fn keep(mut self, retention_limit: usize) -> Self {
        self.retention_limit = retention_limit;
        self
    }

    pub fn with_format(mut self, format: SnapshotFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_strip_tags(mut self, strip_tags: bool) -> Self {
        self.strip_tags = strip_tags;
        self
    }

    pub fn with_mode(mut self, mode: CaptureMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn period(&self) -> Duration {
        self.unit.period(self.interval)
    }

    /// Checks the fields that can be judged without IO.
    ///
    /// Selector syntax is checked by the engine, which owns the parser.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_job_name(&self.name)?;
        if self.interval == 0 {
            return Err(ConfigurationError::InvalidInterval(self.interval));
        }
        if self.retention_limit == 0 {
            return Err(ConfigurationError::InvalidRetention(self.retention_limit));
        }
        Url::parse(&self.target.url).map_err(|err| ConfigurationError::InvalidUrl {
            url: self.target.url.clone(),
            message: err.to_string(),
        })?;
        if self.target.selector.trim().is_empty() {
            return Err(ConfigurationError::InvalidSelector {
                selector: self.target.selector.clone(),
                message: "selector is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Job names double as directory and file name prefixes.
pub fn validate_job_name(name: &str) -> Result<(), ConfigurationError> {
    if name.trim().is_empty() {
        return Err(ConfigurationError::EmptyName);
    }
    let invalid = name != name.trim()
        || name == "."
        || name == ".."
        || name.chars().any(is_forbidden)
        || is_reserved_windows_name(name);
    if invalid {
        return Err(ConfigurationError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
