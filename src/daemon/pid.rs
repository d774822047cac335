// PID file lock primitive
//
// The file at the PID path carries an exclusive, non-blocking advisory lock
// (flock) for as long as the daemon lives, and the daemon's PID as text.
// flock locks belong to the open file description, so a descriptor inherited
// across fork shares the lock, and a second open() of the same path, even in
// the same process, contends for it.

use crate::error::{DaemonError, Result};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, Flock, FlockArg};
use nix::unistd::{access, close, AccessFlags, Pid};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// A PID file path
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

/// Outcome of a lock attempt on a PID file
#[derive(Debug)]
pub enum LockAttempt {
    /// Nobody held the lock; the caller now owns it
    Acquired(PidLock),
    /// Another open file description holds the lock
    Held(HeldPidFile),
}

impl PidFile {
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the path exists and the caller may read it
    pub fn is_readable(&self) -> bool {
        access(&self.path, AccessFlags::R_OK).is_ok()
    }

    /// Open (creating if absent, never truncating) and try to lock the file.
    pub fn try_lock(&self) -> Result<LockAttempt> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| DaemonError::PidFileAccess {
                path: self.path.clone(),
                source,
            })?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(file) => {
                tracing::debug!("Acquired lock on {}", self.path.display());
                Ok(LockAttempt::Acquired(PidLock {
                    file,
                    path: self.path.clone(),
                }))
            }
            Err((file, Errno::EWOULDBLOCK)) => {
                tracing::debug!("Lock on {} is held elsewhere", self.path.display());
                Ok(LockAttempt::Held(HeldPidFile {
                    file,
                    path: self.path.clone(),
                }))
            }
            Err((_, errno)) => Err(DaemonError::Lock {
                path: self.path.clone(),
                errno,
            }),
        }
    }

    /// Remove the PID file from the filesystem
    pub fn remove(&self) -> Result<()> {
        std::fs::remove_file(&self.path).map_err(|source| DaemonError::RemovePidFile {
            path: self.path.clone(),
            source,
        })
    }
}

/// An owned exclusive lock on a PID file.
///
/// Dropping unlocks for every descriptor sharing the lock, including copies
/// inherited across fork. Use [`PidLock::relinquish`] to close only this
/// descriptor and leave the lock with the other holders.
#[derive(Debug)]
pub struct PidLock {
    file: Flock<File>,
    path: PathBuf,
}

impl PidLock {
    /// Replace the file content with `pid` in decimal
    pub fn write_pid(&mut self, pid: Pid) -> Result<()> {
        let rewrite = |file: &mut File| -> std::io::Result<()> {
            file.seek(SeekFrom::Start(0))?;
            file.set_len(0)?;
            write!(file, "{}", pid)?;
            file.flush()?;
            file.sync_data()
        };

        rewrite(&mut *self.file).map_err(|source| DaemonError::WritePid {
            path: self.path.clone(),
            source,
        })
    }

    /// Let the lock survive `exec` so a program replacing this process keeps it
    pub fn keep_across_exec(&self) -> Result<()> {
        fcntl(self.file.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::empty()))
            .map(drop)
            .map_err(|errno| DaemonError::Lock {
                path: self.path.clone(),
                errno,
            })
    }

    /// Explicitly unlock and close
    pub fn release(self) -> Result<()> {
        let path = self.path;
        self.file
            .unlock()
            .map(drop)
            .map_err(|(_, errno)| DaemonError::Lock { path, errno })
    }

    /// Close this descriptor without unlocking
    pub fn relinquish(self) {
        let fd = self.file.as_raw_fd();
        std::mem::forget(self.file);
        if let Err(errno) = close(fd) {
            tracing::warn!("Failed to close {}: {}", self.path.display(), errno);
        }
    }
}

/// A PID file whose lock belongs to someone else
#[derive(Debug)]
pub struct HeldPidFile {
    file: File,
    path: PathBuf,
}

impl HeldPidFile {
    /// Read the PID recorded by the lock holder.
    ///
    /// Returns `None` for empty, non-numeric or non-positive content.
    pub fn read_pid(&mut self) -> Option<Pid> {
        let mut line = String::new();
        self.file.seek(SeekFrom::Start(0)).ok()?;
        BufReader::new(&self.file).read_line(&mut line).ok()?;

        match line.trim().parse::<i32>() {
            Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
            _ => {
                tracing::warn!(
                    "Malformed PID content in {}: {:?}",
                    self.path.display(),
                    line.trim()
                );
                None
            }
        }
    }
}
