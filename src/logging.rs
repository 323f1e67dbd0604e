//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and, when possible, to a
//! file as well. `BINDERY_LOG_FILE` selects an explicit log path; without it
//! the file layer appends to `logs/bindery.log`. File output runs through a
//! non-blocking writer so a slow disk never stalls upload handling.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and optional file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Installs a compact stdout layer and, when available, a file layer.
/// - Keeps the non-blocking worker alive for the process lifetime.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Build a non-blocking writer for file logging.
///
/// Returns `None` when neither the explicit log file nor the default one
/// under `logs/` can be opened.
fn configure_file_writer() -> Option<NonBlocking> {
    let sink: Box<dyn std::io::Write + Send> = match std::env::var("BINDERY_LOG_FILE") {
        Ok(path) => Box::new(open_log_file(&path)?),
        Err(_) => Box::new(default_appender()?),
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(sink);
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}

fn open_log_file(path: &str) -> Option<std::fs::File> {
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("Failed to open log file {path}: {err}");
            None
        }
    }
}

fn default_appender() -> Option<tracing_appender::rolling::RollingFileAppender> {
    if let Err(err) = std::fs::create_dir_all("logs") {
        eprintln!("Failed to create logs directory: {err}");
        return None;
    }
    Some(tracing_appender::rolling::never("logs", "bindery.log"))
}
