use std::path::PathBuf;
use thiserror::Error;

/// Main error type for daemon start/query/stop operations
#[derive(Debug, Error)]
pub enum DaemonError {
    // Configuration errors
    #[error("{0} not specified")]
    MissingConfigField(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Signal error: {0}")]
    SignalError(String),

    // PID file access errors
    #[error("cannot access pid file {path}: {source}")]
    PidFileAccess {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unreadable pid file {0}")]
    UnreadablePidFile(PathBuf),

    #[error("could not lock pid file {path}: {errno}")]
    Lock { path: PathBuf, errno: nix::Error },

    #[error("failed to write pid file {path}: {source}")]
    WritePid {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to remove pid file {path}: {source}")]
    RemovePidFile {
        path: PathBuf,
        source: std::io::Error,
    },

    // Contention errors
    #[error("already running (lock held on {0})")]
    AlreadyRunning(PathBuf),

    #[error("process not running (no lock held on {0})")]
    NotRunning(PathBuf),

    // OS primitive failures
    #[error("unable to fork: {0}")]
    Fork(nix::Error),

    #[error("failed to detach: {0}")]
    Detach(nix::Error),

    #[error("failed to open {stream} target {target}: {source}")]
    StreamOpen {
        stream: &'static str,
        target: String,
        source: std::io::Error,
    },

    #[error("failed to redirect {stream}: {errno}")]
    StreamRedirect {
        stream: &'static str,
        errno: nix::Error,
    },
}

/// Result type alias for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;
