// Liveness probe and termination for a daemon identified by its PID file.
//
// Liveness is decided by the lock alone; the recorded PID is only used as
// the signal target once the lock shows the daemon is alive.

use super::pid::{LockAttempt, PidFile};
use crate::error::{DaemonError, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};

/// Daemon status information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub pid_file: PathBuf,
}

/// Check whether the daemon guarded by `path` is alive.
///
/// A missing or unreadable PID file means "not running", not an error.
pub fn is_running<P: AsRef<Path>>(path: P) -> Result<bool> {
    let pid_file = PidFile::with_path(path);
    if !pid_file.is_readable() {
        return Ok(false);
    }

    match pid_file.try_lock()? {
        LockAttempt::Acquired(lock) => {
            lock.release()?;
            Ok(false)
        }
        LockAttempt::Held(_) => Ok(true),
    }
}

/// Send `signal` to the daemon guarded by `path`.
///
/// Returns `Ok(false)` when the signal could not be delivered (stale or
/// malformed PID). With `delete`, the PID file is removed after delivery.
pub fn kill<P: AsRef<Path>>(path: P, delete: bool, signal: Signal) -> Result<bool> {
    let pid_file = PidFile::with_path(path);
    if !pid_file.is_readable() {
        return Err(DaemonError::UnreadablePidFile(pid_file.path().to_path_buf()));
    }

    let mut held = match pid_file.try_lock()? {
        LockAttempt::Acquired(lock) => {
            lock.release()?;
            return Err(DaemonError::NotRunning(pid_file.path().to_path_buf()));
        }
        LockAttempt::Held(held) => held,
    };

    let Some(pid) = held.read_pid() else {
        return Ok(false);
    };

    match signal::kill(pid, signal) {
        Ok(()) => {
            tracing::info!("Sent {} to daemon (PID: {})", signal, pid);
            if delete {
                pid_file.remove()?;
            }
            Ok(true)
        }
        Err(errno) => {
            tracing::warn!("Failed to send {} to PID {}: {}", signal, pid, errno);
            Ok(false)
        }
    }
}

/// The PID of the running daemon, if the lock confirms one is alive
pub fn read_pid<P: AsRef<Path>>(path: P) -> Result<Option<Pid>> {
    let pid_file = PidFile::with_path(path);
    if !pid_file.is_readable() {
        return Ok(None);
    }

    match pid_file.try_lock()? {
        LockAttempt::Acquired(lock) => {
            lock.release()?;
            Ok(None)
        }
        LockAttempt::Held(mut held) => Ok(held.read_pid()),
    }
}

/// Get daemon status information from a single lock attempt
pub fn status<P: AsRef<Path>>(path: P) -> Result<DaemonStatus> {
    let pid_file = PidFile::with_path(path);
    let (running, pid) = if !pid_file.is_readable() {
        (false, None)
    } else {
        match pid_file.try_lock()? {
            LockAttempt::Acquired(lock) => {
                lock.release()?;
                (false, None)
            }
            LockAttempt::Held(mut held) => (true, held.read_pid()),
        }
    };

    Ok(DaemonStatus {
        running,
        pid: pid.map(|pid| pid.as_raw() as u32),
        pid_file: pid_file.path().to_path_buf(),
    })
}
