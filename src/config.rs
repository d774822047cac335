use crate::error::{DaemonError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use nix::sys::signal::Signal;

/// Where one of the daemon's standard streams is pointed after detaching.
///
/// In configuration files a target is a plain string: the literal `stdout`
/// selects the launching process's own standard output, anything else is a
/// filesystem path (use `./stdout` for a file of that name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StreamTarget {
    /// A file opened (or created) at this path
    Path(PathBuf),
    /// The launching process's standard output, duplicated before redirection
    Stdout,
}

impl StreamTarget {
    /// The null device, used for the default stdin/stdout targets
    pub fn null() -> Self {
        StreamTarget::Path(PathBuf::from("/dev/null"))
    }
}

impl From<String> for StreamTarget {
    fn from(value: String) -> Self {
        if value == "stdout" {
            StreamTarget::Stdout
        } else {
            StreamTarget::Path(PathBuf::from(value))
        }
    }
}

impl From<&str> for StreamTarget {
    fn from(value: &str) -> Self {
        StreamTarget::from(value.to_string())
    }
}

impl From<PathBuf> for StreamTarget {
    fn from(path: PathBuf) -> Self {
        StreamTarget::Path(path)
    }
}

impl From<&Path> for StreamTarget {
    fn from(path: &Path) -> Self {
        StreamTarget::Path(path.to_path_buf())
    }
}

impl From<StreamTarget> for String {
    fn from(target: StreamTarget) -> Self {
        match target {
            StreamTarget::Path(path) => path.to_string_lossy().into_owned(),
            StreamTarget::Stdout => "stdout".to_string(),
        }
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamTarget::Path(path) => write!(f, "{}", path.display()),
            StreamTarget::Stdout => f.write_str("stdout"),
        }
    }
}

/// Options for daemonizing a workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonOptions {
    /// PID file path; doubles as the singleton lock
    #[serde(default)]
    pub pid: PathBuf,

    /// Input stream target (default: /dev/null)
    #[serde(default = "default_stdin")]
    pub stdin: StreamTarget,

    /// Output stream target (default: /dev/null)
    #[serde(default = "default_stdout")]
    pub stdout: StreamTarget,

    /// Error stream target (default: the caller's stdout)
    #[serde(default = "default_stderr")]
    pub stderr: StreamTarget,
}

// Default value functions for serde
fn default_stdin() -> StreamTarget {
    StreamTarget::null()
}

fn default_stdout() -> StreamTarget {
    StreamTarget::null()
}

fn default_stderr() -> StreamTarget {
    StreamTarget::Stdout
}

impl DaemonOptions {
    /// Options for the given PID file with default stream targets
    pub fn new<P: AsRef<Path>>(pid: P) -> Self {
        Self {
            pid: pid.as_ref().to_path_buf(),
            stdin: default_stdin(),
            stdout: default_stdout(),
            stderr: default_stderr(),
        }
    }

    pub fn with_stdin(mut self, target: impl Into<StreamTarget>) -> Self {
        self.stdin = target.into();
        self
    }

    pub fn with_stdout(mut self, target: impl Into<StreamTarget>) -> Self {
        self.stdout = target.into();
        self
    }

    pub fn with_stderr(mut self, target: impl Into<StreamTarget>) -> Self {
        self.stderr = target.into();
        self
    }

    /// Load and validate options from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<DaemonOptions> {
        let options = Self::load(path)?;
        options.validate()?;
        Ok(options)
    }

    /// Parse options from a file without validating them, so that callers
    /// can fill in fields (such as `pid`) from elsewhere first
    pub fn load(path: &Path) -> Result<DaemonOptions> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DaemonError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .map_err(|e| DaemonError::InvalidConfig(format!("Failed to parse TOML: {}", e))),
            "json" => serde_json::from_str(&contents)
                .map_err(|e| DaemonError::InvalidConfig(format!("Failed to parse JSON: {}", e))),
            _ => Err(DaemonError::InvalidConfig(format!(
                "Unsupported file format: {}. Use .toml or .json",
                extension
            ))),
        }
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.pid.as_os_str().is_empty() {
            return Err(DaemonError::MissingConfigField("pid".to_string()));
        }

        for (stream, target) in [
            ("stdin", &self.stdin),
            ("stdout", &self.stdout),
            ("stderr", &self.stderr),
        ] {
            if let StreamTarget::Path(path) = target {
                if path.as_os_str().is_empty() {
                    return Err(DaemonError::ConfigError(format!(
                        "{} target cannot be empty",
                        stream
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Signal sent by `kill` when none is given
pub const DEFAULT_SIGNAL: Signal = Signal::SIGTERM;

/// Parse a signal given as `SIGTERM`, `TERM`, `term` or a number
pub fn parse_signal(signal_name: &str) -> Result<Signal> {
    let name = signal_name.trim();

    if let Ok(number) = name.parse::<i32>() {
        return Signal::try_from(number).map_err(|_| {
            DaemonError::SignalError(format!("Invalid signal number: {}", number))
        });
    }

    let upper = name.to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };

    full.parse::<Signal>()
        .map_err(|_| DaemonError::SignalError(format!("Invalid signal name: {}", signal_name)))
}
