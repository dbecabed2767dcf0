//! Directory-scoped advisory locks with a bounded wait.
//!
//! Workers that extract into a shared, well-known path may be separate
//! processes, so exclusion goes through an OS file lock rather than an
//! in-memory mutex. Acquisition polls a non-blocking lock until a deadline.
//! The holder removes the lock file when it releases, so a waiter that wins
//! the lock on an already unlinked file must start over with a fresh one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use log::{debug, warn};
use thiserror::Error;

/// Delay between two acquisition attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors raised while acquiring a lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock name would address a path outside the lock directory.
    #[error("invalid lock name {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// Creating, locking, or writing the lock file failed.
    #[error("lock file I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of [`with_lock`].
#[derive(Debug, PartialEq, Eq)]
pub enum LockOutcome<T> {
    /// The lock was held while the body ran; carries its result.
    Acquired(T),
    /// The deadline passed first; the body did not run.
    NotAcquired,
}

impl<T> LockOutcome<T> {
    /// Whether the body ran.
    #[must_use]
    pub const fn acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }

    /// The body's result, if it ran.
    #[must_use]
    pub fn into_inner(self) -> Option<T> {
        match self {
            Self::Acquired(value) => Some(value),
            Self::NotAcquired => None,
        }
    }
}

/// A named lock file inside a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvisoryLock {
    path: PathBuf,
}

impl AdvisoryLock {
    /// Address `<directory>/<name>.lock`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::InvalidName`] when `name` is empty or contains a
    /// path separator or a parent reference.
    pub fn new(directory: &Path, name: &str) -> Result<Self, LockError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." || name == "." {
            return Err(LockError::InvalidName {
                name: name.to_owned(),
            });
        }
        Ok(Self {
            path: directory.join(format!("{name}.lock")),
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to take the lock, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` when another holder kept it past the deadline. A
    /// zero timeout makes a single attempt.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Io`] when the lock file cannot be created or
    /// locked for a reason other than contention.
    pub fn acquire(&self, timeout: Duration) -> Result<Option<LockGuard>, LockError> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(guard) = self.try_acquire()? {
                debug!(target: "lock", "acquired {}", self.path.display());
                return Ok(Some(guard));
            }
            let now = Instant::now();
            let remaining =
                deadline.map_or(POLL_INTERVAL, |end| end.saturating_duration_since(now));
            if remaining.is_zero() {
                debug!(target: "lock", "timed out waiting for {}", self.path.display());
                return Ok(None);
            }
            thread::sleep(remaining.min(POLL_INTERVAL));
        }
    }

    fn try_acquire(&self) -> Result<Option<LockGuard>, LockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(error) if is_contended(&error) => return Ok(None),
            Err(error) => return Err(error.into()),
        }

        if !names_same_file(&file, &self.path)? {
            debug!(target: "lock", "{} was released under us; retrying", self.path.display());
            return Ok(None);
        }

        LockGuard::claim(file, self.path.clone()).map(Some)
    }
}

/// Holds a lock until dropped; dropping removes the file and unlocks it.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Take ownership of a locked `file` and record this process in it.
    ///
    /// The guard exists before the write, so a failed write still unlinks
    /// the file and releases the lock.
    fn claim(file: File, path: PathBuf) -> Result<Self, LockError> {
        let mut guard = Self { file, path };
        guard.file.set_len(0)?;
        writeln!(guard.file, "{}", std::process::id())?;
        guard.file.flush()?;
        Ok(guard)
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Unlink while still holding the lock so no waiter can lock the old
        // inode and believe it owns the path.
        if let Err(error) = fs::remove_file(&self.path) {
            warn!(target: "lock", "failed to remove {}: {error}", self.path.display());
        }
        if let Err(error) = FileExt::unlock(&self.file) {
            warn!(target: "lock", "failed to unlock {}: {error}", self.path.display());
        }
    }
}

/// Run `body` while holding `<directory>/<name>.lock`.
///
/// The lock is released on every exit path, including when `body` panics.
///
/// ```
/// use std::time::Duration;
/// use addon_ingest::lock::with_lock;
///
/// let dir = tempfile::tempdir().unwrap();
/// let outcome = with_lock(dir.path(), "upload-1", Duration::from_secs(1), || 7).unwrap();
/// assert_eq!(outcome.into_inner(), Some(7));
/// ```
///
/// # Errors
///
/// See [`AdvisoryLock::new`] and [`AdvisoryLock::acquire`].
pub fn with_lock<T, F>(
    directory: &Path,
    name: &str,
    timeout: Duration,
    body: F,
) -> Result<LockOutcome<T>, LockError>
where
    F: FnOnce() -> T,
{
    let lock = AdvisoryLock::new(directory, name)?;
    let Some(guard) = lock.acquire(timeout)? else {
        return Ok(LockOutcome::NotAcquired);
    };
    let value = body();
    drop(guard);
    Ok(LockOutcome::Acquired(value))
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(unix)]
fn names_same_file(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

#[cfg(not(unix))]
fn names_same_file(_file: &File, path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}
