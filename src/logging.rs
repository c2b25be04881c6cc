use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,assistant_core=debug,assistant=debug";

/// Send tracing output to a daily rolling file. Keep the guard alive until
/// exit so buffered lines are flushed.
pub fn init(log_dir: Option<PathBuf>) -> Result<WorkerGuard> {
    let log_dir = resolve_log_dir(log_dir)?;
    std::fs::create_dir_all(&log_dir)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_appender = tracing_appender::rolling::daily(&log_dir, "assistant.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(guard)
}

pub fn resolve_log_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }

    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("assistant").join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_log_dir_wins() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve_log_dir(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(resolved, dir.path());
    }

    // The only test that installs the global subscriber, so ordering is fixed.
    #[test]
    fn test_init_creates_log_dir_and_rejects_second_install() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");

        let guard = init(Some(log_dir.clone())).unwrap();
        assert!(log_dir.is_dir());

        let err = init(Some(dir.path().join("other"))).unwrap_err();
        assert!(err.to_string().contains("already installed"));
        drop(guard);
    }
}
