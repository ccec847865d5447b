mod config;
mod console;

use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use scan_logging::{scan_info, scan_warn};
use scanner_engine::{ChannelEventSink, ScanManager};

use config::{load_config, DEFAULT_CONFIG_FILE};
use console::{describe_event, Console};

fn main() -> Result<()> {
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = load_config(&config_path)?;

    if !scan_logging::initialize(&config.log_destination(), config.log_level()?) {
        eprintln!("Warning: logging is disabled");
    }
    scan_info!("Using config {:?} with {} job(s)", config_path, config.jobs.len());

    let (sink, events) = ChannelEventSink::channel();
    let manager = ScanManager::new(config.engine_settings(), Arc::new(sink))?;

    for job in &config.jobs {
        let spec = job.to_spec()?;
        manager
            .schedule_job(spec)
            .with_context(|| format!("scheduling {:?}", job.name))?;
        if job.autostart {
            manager.run(&job.name)?;
        }
    }

    thread::Builder::new()
        .name("scan-events".to_string())
        .spawn(move || {
            for event in events {
                println!("{}", describe_event(&event));
            }
        })?;

    let mut console = Console::new(&manager, config_path, config);
    let outcome = console.run(io::stdin().lock(), &mut io::stdout());
    if let Err(err) = &outcome {
        scan_warn!("Console ended with an error: {:#}", err);
    }

    manager.shutdown();
    outcome
}
