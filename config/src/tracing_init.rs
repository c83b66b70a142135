//! Tracing setup for binaries: logs go to `LOG_FILE` or are dropped, never to stdout.
//!
//! - **RUST_LOG**: filter, e.g. `info`, `trellis=debug`. Default: `info`.
//! - **LOG_FILE**: when set, logs are appended there through a non-blocking writer.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::LoadError;

/// Installs the global subscriber. Keep the returned guard alive for the life of the
/// process so buffered lines are flushed on exit.
pub fn init(default_filter: &str) -> Result<Option<WorkerGuard>, LoadError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let Ok(path) = std::env::var("LOG_FILE") else {
        let sink_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::sink)
            .with_filter(filter);
        let _ = tracing_subscriber::registry().with(sink_layer).try_init();
        return Ok(None);
    };

    let path = Path::new(&path);
    let file_name = path
        .file_name()
        .ok_or_else(|| LoadError::LogFile(format!("not a file path: {}", path.display())))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| LoadError::LogFile(e.to_string()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter);
    let _ = tracing_subscriber::registry().with(file_layer).try_init();
    tracing::info!(path = %path.display(), "logging to file");
    Ok(Some(guard))
}
