//! Tracing subscriber setup for the binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to `main` so tests can run the core without any global logger.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "feedhook=info";

/// Install the global subscriber.
///
/// Console output goes to stderr. With `quiet_console` (the live table owns
/// stdout) the console only shows warnings and errors; the optional log file
/// always gets the full filter. Keep the returned guard alive until exit or
/// buffered file lines are lost.
pub fn init_logging(log_file: Option<&Path>, quiet_console: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let console_filter = if quiet_console {
        EnvFilter::new("warn")
    } else {
        filter()
    };
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("Failed to open log file '{}': {}", path.display(), e))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;

    Ok(guard)
}
