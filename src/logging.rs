//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and, optionally, to a file. `STUTUTOR_LOG_FILE`
//! selects an explicit path; otherwise `logs/stututor.log` is used. Set `STUTUTOR_LOG_FILE=off`
//! to keep stdout only (useful in containers). File output goes through a non‑blocking writer.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "STUTUTOR_LOG_FILE";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and optional file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Uses a global guard to keep the non‑blocking writer alive for the process lifetime.
/// - Calling it twice is harmless; the second registration is ignored.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let result = match configure_file_writer(std::env::var(LOG_FILE_ENV).ok()) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).try_init()
        }
        None => registry.try_init(),
    };

    if let Err(err) = result {
        eprintln!("Tracing already initialized: {err}");
    }
}

/// Build a non‑blocking writer for file logging.
///
/// Returns `None` when file logging is switched off, the logs directory cannot be created, or
/// the target file cannot be opened.
fn configure_file_writer(target: Option<String>) -> Option<NonBlocking> {
    match target.as_deref().map(str::trim) {
        Some(value) if value.eq_ignore_ascii_case("off") => None,
        Some(path) if !path.is_empty() => {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(file) => {
                    let (non_blocking, guard) = tracing_appender::non_blocking(file);
                    let _ = LOG_GUARD.set(guard);
                    Some(non_blocking)
                }
                Err(err) => {
                    eprintln!("Failed to open log file {path}: {err}");
                    None
                }
            }
        }
        _ => {
            if let Err(err) = std::fs::create_dir_all("logs") {
                eprintln!("Failed to create logs directory: {err}");
                return None;
            }
            let file_appender = tracing_appender::rolling::never("logs", "stututor.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::configure_file_writer;

    #[test]
    fn file_logging_can_be_switched_off() {
        assert!(configure_file_writer(Some("OFF".into())).is_none());
    }
}
