//! Line-oriented operator console over a [`ScanManager`].

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use scan_logging::scan_warn;
use scanner_core::{JobRowView, SearchSession, Transition};
use scanner_engine::{ParseKind, ScanEvent, ScanManager, StoreError};

use crate::config::{save_config, PersistedConfig, PersistedJob, PersistedMode};

const HELP: &str = "\
commands:
  list                                   show every job
  run|pause|resume|stop NAME             change a job's state
  capture NAME                           capture a running job now
  latest NAME                            show the newest snapshot
  diff NAME                              compare the last two captures
  search NAME TERM                       search the current capture
  view NAME text|links|images|tables     re-view the current capture
  save NAME PATH                         write the current capture to PATH
  export NAME PATH TERM                  write the lines matching TERM to PATH
  next | prev                            move through search matches
  schedule NAME URL SELECTOR INTERVAL UNIT [RETENTION] [FORMAT] [continuous]
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Run(String),
    Pause(String),
    Resume(String),
    Stop(String),
    Capture(String),
    Latest(String),
    Diff(String),
    Search { job: String, term: String },
    View { job: String, kind: ParseKind },
    Save { job: String, path: PathBuf },
    Export { job: String, path: PathBuf, term: String },
    Next,
    Previous,
    Schedule(PersistedJob),
    Help,
    Quit,
}

/// Parses one input line; blank lines give `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let job = |args: &[&str]| -> Result<String> {
        match args {
            [name] => Ok((*name).to_string()),
            _ => bail!("{verb} takes exactly one job name"),
        }
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" => Command::List,
        "run" => Command::Run(job(&args)?),
        "pause" => Command::Pause(job(&args)?),
        "resume" => Command::Resume(job(&args)?),
        "stop" => Command::Stop(job(&args)?),
        "capture" => Command::Capture(job(&args)?),
        "latest" => Command::Latest(job(&args)?),
        "diff" => Command::Diff(job(&args)?),
        "search" => {
            // The term is taken verbatim so inner whitespace still matches.
            let (name, term) = split_word(split_word(line).1);
            let term = term.trim_start();
            if name.is_empty() || term.is_empty() {
                bail!("usage: search NAME TERM");
            }
            Command::Search {
                job: name.to_string(),
                term: term.to_string(),
            }
        }
        "view" | "parse" => match args[..] {
            [name, kind] => match ParseKind::from_name(kind) {
                Some(kind) => Command::View {
                    job: name.to_string(),
                    kind,
                },
                None => bail!("unknown view {kind:?}; use text, links, images or tables"),
            },
            _ => bail!("usage: view NAME text|links|images|tables"),
        },
        "save" => match args[..] {
            [name, path] => Command::Save {
                job: name.to_string(),
                path: PathBuf::from(path),
            },
            _ => bail!("usage: save NAME PATH"),
        },
        "export" => {
            let (name, rest) = split_word(split_word(line).1);
            let (path, term) = split_word(rest);
            let term = term.trim_start();
            if name.is_empty() || path.is_empty() || term.is_empty() {
                bail!("usage: export NAME PATH TERM");
            }
            Command::Export {
                job: name.to_string(),
                path: PathBuf::from(path),
                term: term.to_string(),
            }
        }
        "next" => Command::Next,
        "prev" | "previous" => Command::Previous,
        "schedule" => Command::Schedule(parse_schedule(&args)?),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command {other:?}; try help"),
    };
    Ok(Some(command))
}

/// Splits off the first word, returning it and the untouched remainder.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => text.split_at(end),
        None => (text, ""),
    }
}

fn parse_schedule(args: &[&str]) -> Result<PersistedJob> {
    let [name, url, selector, interval, unit, rest @ ..] = args else {
        bail!("usage: schedule NAME URL SELECTOR INTERVAL UNIT [RETENTION] [FORMAT] [continuous]");
    };
    let mut job = PersistedJob {
        name: (*name).to_string(),
        url: (*url).to_string(),
        selector: (*selector).to_string(),
        interval: interval
            .parse()
            .map_err(|_| anyhow::anyhow!("interval {interval:?} is not a number"))?,
        unit: (*unit).to_string(),
        ..PersistedJob::default()
    };
    for word in rest {
        if word.eq_ignore_ascii_case("continuous") {
            job.mode = PersistedMode::Continuous;
        } else if let Ok(retention) = word.parse() {
            job.retention = retention;
        } else {
            job.format = (*word).to_string();
        }
    }
    Ok(job)
}

pub enum Flow {
    Continue,
    Quit,
}

pub struct Console<'a> {
    manager: &'a ScanManager,
    config_path: PathBuf,
    config: PersistedConfig,
    search: Option<SearchSession>,
}

impl<'a> Console<'a> {
    pub fn new(manager: &'a ScanManager, config_path: PathBuf, config: PersistedConfig) -> Self {
        Self {
            manager,
            config_path,
            config,
            search: None,
        }
    }

    /// Reads commands until `quit` or end of input.
    pub fn run(&mut self, input: impl BufRead, out: &mut impl Write) -> Result<()> {
        writeln!(out, "Type help for commands.")?;
        for line in input.lines() {
            let line = line?;
            let flow = match parse_command(&line) {
                Ok(Some(command)) => self.execute(command, out),
                Ok(None) => Ok(Flow::Continue),
                Err(err) => Err(err),
            };
            match flow {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => writeln!(out, "error: {err:#}")?,
            }
        }
        Ok(())
    }

    pub fn execute(&mut self, command: Command, out: &mut impl Write) -> Result<Flow> {
        let manager = self.manager;
        match command {
            Command::List => {
                let rows = manager.list_jobs();
                if rows.is_empty() {
                    writeln!(out, "no jobs scheduled")?;
                }
                for row in &rows {
                    writeln!(out, "{}", describe_row(row))?;
                }
            }
            Command::Run(name) => report(out, &name, manager.run(&name)?)?,
            Command::Pause(name) => report(out, &name, manager.pause(&name)?)?,
            Command::Resume(name) => report(out, &name, manager.resume(&name)?)?,
            Command::Stop(name) => report(out, &name, manager.stop(&name)?)?,
            Command::Capture(name) => {
                if manager.capture_now(&name)? {
                    writeln!(out, "{name}: capture requested")?;
                } else {
                    writeln!(out, "{name}: not running; nothing captured")?;
                }
            }
            Command::Latest(name) => match manager.latest_snapshot(&name) {
                Ok(snapshot) => {
                    writeln!(
                        out,
                        "{} ({})",
                        snapshot.path.display(),
                        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S")
                    )?;
                    writeln!(out, "{}", manager.snapshot_preview(&name)?)?;
                }
                Err(StoreError::NotFound(_)) => writeln!(out, "No recent results found for {name}.")?,
                Err(err) => return Err(err.into()),
            },
            Command::Diff(name) => match manager.unified_diff_job(&name)? {
                None => writeln!(out, "{name}: need two captures to compare")?,
                Some(text) if text.is_empty() => writeln!(out, "{name}: no changes")?,
                Some(text) => write!(out, "{text}")?,
            },
            Command::Search { job, term } => {
                let session = manager.search_session(&job, &term)?;
                writeln!(out, "{} match(es) for {:?}", session.matches().len(), term)?;
                describe_selection(out, &session)?;
                self.search = Some(session);
            }
            Command::View { job, kind } => match manager.parse_job(&job, kind)? {
                None => writeln!(out, "{job}: no content to parse")?,
                Some(text) if text.trim().is_empty() => writeln!(out, "{job}: no {kind} found")?,
                Some(text) => writeln!(out, "{}", text.trim_end())?,
            },
            Command::Save { job, path } => {
                let written = manager.export_job(&job, &path)?;
                writeln!(out, "{job}: saved to {}", written.display())?;
            }
            Command::Export { job, path, term } => {
                let written = manager.export_search(&job, &term, &path)?;
                writeln!(out, "{job}: matches for {term:?} exported to {}", written.display())?;
            }
            Command::Next | Command::Previous => {
                let Some(session) = self.search.as_mut() else {
                    bail!("no active search");
                };
                if matches!(command, Command::Next) {
                    session.select_next();
                } else {
                    session.select_previous();
                }
                describe_selection(out, session)?;
            }
            Command::Schedule(job) => {
                let spec = job.to_spec()?;
                manager.schedule_job(spec)?;
                writeln!(out, "{}: scheduled every {} {}", job.name, job.interval, job.unit)?;
                self.config.jobs.push(job);
                if let Err(err) = save_config(&self.config_path, &self.config) {
                    scan_warn!("Could not save config: {:#}", err);
                }
            }
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }
}

fn report(out: &mut impl Write, name: &str, transition: Transition) -> Result<()> {
    match transition {
        Transition::Applied { from, to, .. } => writeln!(out, "{name}: {from} -> {to}")?,
        Transition::Ignored { state } => writeln!(out, "{name}: unchanged ({state})")?,
    }
    Ok(())
}

fn describe_selection(out: &mut impl Write, session: &SearchSession) -> Result<()> {
    match (session.position(), session.current()) {
        (Some(idx), Some(hit)) => writeln!(
            out,
            "match {}/{} at bytes {}..{}",
            idx + 1,
            session.matches().len(),
            hit.start,
            hit.end
        )?,
        _ => writeln!(out, "no matches")?,
    }
    Ok(())
}

pub fn describe_row(row: &JobRowView) -> String {
    let last = row
        .last_capture
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let mut line = format!(
        "{} | every {} {} | keep {} | {} | {} capture(s), last {}",
        row.label(),
        row.interval,
        row.unit,
        row.retention_limit,
        row.format.extension(),
        row.captures,
        last
    );
    if let Some(error) = &row.last_error {
        line.push_str(&format!(" | error: {error}"));
    }
    line
}

pub fn describe_event(event: &ScanEvent) -> String {
    match event {
        ScanEvent::StateChanged { job, from, to } => format!("[{job}] {from} -> {to}"),
        ScanEvent::SnapshotSaved { job, path, bytes } => {
            format!("[{job}] saved {} ({bytes} bytes)", path.display())
        }
        ScanEvent::NoElements { job } => format!("[{job}] no elements found"),
        ScanEvent::SnapshotsPruned { job, removed } => {
            format!("[{job}] pruned {removed} old snapshot(s)")
        }
        ScanEvent::CaptureFailed { job, error } => format!("[{job}] capture failed: {error}"),
        ScanEvent::WorkerFailed { job, error } => format!("[{job}] worker stopped: {error}"),
    }
}
