// Library exports for daemonizer

#[cfg(not(unix))]
compile_error!("daemonizer requires a Unix platform (fork, setsid, flock)");

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;

pub use config::{DaemonOptions, StreamTarget, DEFAULT_SIGNAL};
pub use daemon::{is_running, kill, work, DaemonStdio};
pub use error::{DaemonError, Result};
