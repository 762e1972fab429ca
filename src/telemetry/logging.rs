use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

pub const GAME_LOG: &str = "game.log";

static INSTALLED: OnceLock<PathBuf> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("create log directory {path}: {source}")]
    Directory { path: PathBuf, source: io::Error },
    #[error("open log {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("install log subscriber: {0}")]
    Subscriber(String),
}

/// Sends events to stderr and appends them to `<root>/log/game.log`.
/// `RUST_LOG` overrides the level. Later calls return the first log path.
pub fn init(root: &Path, verbose: bool) -> Result<PathBuf, LogError> {
    if let Some(path) = INSTALLED.get() {
        return Ok(path.clone());
    }
    let log_dir = root.join("log");
    std::fs::create_dir_all(&log_dir).map_err(|source| LogError::Directory {
        path: log_dir.clone(),
        source,
    })?;
    let path = log_dir.join(GAME_LOG);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| LogError::Open {
            path: path.clone(),
            source,
        })?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(io::stderr.and(Arc::new(file)))
        .try_init()
        .map_err(|err| LogError::Subscriber(err.to_string()))?;

    Ok(INSTALLED.get_or_init(|| path).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_the_game_log_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = init(dir.path(), false).expect("init");
        assert_eq!(first, dir.path().join("log").join(GAME_LOG));
        assert!(first.exists());
        tracing::info!("logging test line");

        let other = tempfile::tempdir().expect("tempdir");
        assert_eq!(init(other.path(), true).expect("again"), first);
    }
}
