// Daemon module - start, probe and stop a PID-file guarded background process

pub mod control;
pub mod daemonize;
pub mod pid;

pub use control::{is_running, kill, read_pid, status, DaemonStatus};
pub use daemonize::{work, DaemonStdio};
pub use pid::{LockAttempt, PidFile, PidLock};
