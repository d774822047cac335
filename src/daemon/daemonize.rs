// Daemonization support for Unix systems

use super::pid::{LockAttempt, PidFile, PidLock};
use crate::config::{DaemonOptions, StreamTarget};
use crate::error::{DaemonError, Result};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{dup2, fork, setsid, ForkResult, Pid};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsFd;
use std::os::unix::io::AsRawFd;
use std::panic::{self, AssertUnwindSafe};

/// Terminal job-control and hangup signals the daemon ignores
const IGNORED_SIGNALS: [Signal; 4] = [
    Signal::SIGTSTP,
    Signal::SIGTTOU,
    Signal::SIGTTIN,
    Signal::SIGHUP,
];

/// The daemon's standard streams, opened against the configured targets.
///
/// The same targets are also installed on descriptors 0, 1 and 2.
#[derive(Debug)]
pub struct DaemonStdio {
    pub stdin: File,
    pub stdout: File,
    pub stderr: File,
}

/// Fork `callable` into a detached background process guarded by the PID file.
///
/// In the calling process this returns the daemon's PID once it has been
/// written to the PID file. In the daemon it never returns: the process exits
/// when `callable` finishes, with status 0 on `Ok`, 1 on `Err` and 101 if it
/// panics.
///
/// The lock descriptor stays open across `exec`, so `callable` may replace
/// the daemon with another program without giving up the lock.
pub fn work<F>(options: &DaemonOptions, callable: F) -> Result<Pid>
where
    F: FnOnce(DaemonStdio) -> anyhow::Result<()>,
{
    options.validate()?;

    let pid_file = PidFile::with_path(&options.pid);
    let mut lock = match pid_file.try_lock()? {
        LockAttempt::Acquired(lock) => lock,
        LockAttempt::Held(_) => return Err(DaemonError::AlreadyRunning(options.pid.clone())),
    };

    // Buffered output would otherwise be written twice
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    // SAFETY: the child only opens files, duplicates descriptors and sets
    // signal dispositions before handing control to `callable`.
    match unsafe { fork() } {
        Err(errno) => Err(DaemonError::Fork(errno)),
        Ok(ForkResult::Parent { child }) => {
            if let Err(e) = lock.write_pid(child) {
                // No daemon may outlive a PID file that does not name it
                let _ = signal::kill(child, Signal::SIGKILL);
                let _ = waitpid(child, None);
                return Err(e);
            }

            tracing::info!(
                "Daemon started (PID: {}, pid file: {})",
                child,
                options.pid.display()
            );

            // Closing our descriptor leaves the lock with the child
            lock.relinquish();
            Ok(child)
        }
        Ok(ForkResult::Child) => {
            // `lock` stays open here; the kernel releases it once this process is gone
            let code = run_daemon(options, &lock, callable);
            std::process::exit(code)
        }
    }
}

fn run_daemon<F>(options: &DaemonOptions, lock: &PidLock, callable: F) -> i32
where
    F: FnOnce(DaemonStdio) -> anyhow::Result<()>,
{
    let stdio = match lock.keep_across_exec().and_then(|()| detach(options)) {
        Ok(stdio) => stdio,
        Err(e) => {
            tracing::error!("Daemon setup failed: {}", e);
            return 1;
        }
    };

    // A panic must not unwind past `work` into the caller's code in this process
    match panic::catch_unwind(AssertUnwindSafe(|| callable(stdio))) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            tracing::error!("Daemon workload failed: {:#}", e);
            1
        }
        Err(_) => {
            tracing::error!("Daemon workload panicked");
            101
        }
    }
}

/// Child-side setup: new session, redirected streams, ignored terminal signals.
fn detach(options: &DaemonOptions) -> Result<DaemonStdio> {
    setsid().map_err(DaemonError::Detach)?;

    // Resolve every target before touching descriptors 0-2 so that the
    // `stdout` target still refers to the launching process's output.
    let stdio = DaemonStdio {
        stdin: open_target("stdin", &options.stdin, false)?,
        stdout: open_target("stdout", &options.stdout, true)?,
        stderr: open_target("stderr", &options.stderr, true)?,
    };

    redirect("stdin", &stdio.stdin, nix::libc::STDIN_FILENO)?;
    redirect("stdout", &stdio.stdout, nix::libc::STDOUT_FILENO)?;
    redirect("stderr", &stdio.stderr, nix::libc::STDERR_FILENO)?;

    for sig in IGNORED_SIGNALS {
        // SAFETY: SigIgn installs no handler code
        unsafe { signal::signal(sig, SigHandler::SigIgn) }
            .map_err(|e| DaemonError::SignalError(format!("Failed to ignore {}: {}", sig, e)))?;
    }

    Ok(stdio)
}

fn open_target(stream: &'static str, target: &StreamTarget, write: bool) -> Result<File> {
    let opened = match target {
        StreamTarget::Path(path) => {
            let mut open_options = OpenOptions::new();
            if write {
                open_options.append(true).create(true);
            } else {
                open_options.read(true);
            }
            open_options.open(path)
        }
        StreamTarget::Stdout => std::io::stdout()
            .as_fd()
            .try_clone_to_owned()
            .map(File::from),
    };

    opened.map_err(|source| DaemonError::StreamOpen {
        stream,
        target: target.to_string(),
        source,
    })
}

fn redirect(stream: &'static str, file: &File, fd: i32) -> Result<()> {
    dup2(file.as_raw_fd(), fd)
        .map(drop)
        .map_err(|errno| DaemonError::StreamRedirect { stream, errno })
}
