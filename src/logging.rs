//! Tracing setup: stdout plus an optional plain-text log file

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "octo_bridge=info";

/// Install the global subscriber. The log file, if any, starts empty each run.
pub fn init(log_file: Option<&str>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = open_log_file(Path::new(path))
                .with_context(|| format!("cannot open log file {}", path))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .try_init()
        .context("tracing subscriber already installed")?;

    Ok(())
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}
