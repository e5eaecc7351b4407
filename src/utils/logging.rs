//! Diagnostic logging setup.
//!
//! The terminal belongs to the conversation, so tracing output goes to a file
//! given with `--log`, or to stderr only when `SENSAI_LOG_STDERR` is set.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_STDERR_ENV: &str = "SENSAI_LOG_STDERR";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sensai=info"))
}

pub fn init_tracing(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_ansi(false)
            .with_target(true)
            .with_writer(Mutex::new(file))
            .try_init()
            .map_err(|err| -> Box<dyn Error> { err })?;
        return Ok(());
    }

    if std::env::var_os(LOG_STDERR_ENV).is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| -> Box<dyn Error> { err })?;
    }

    Ok(())
}
