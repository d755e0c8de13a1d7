//! Advisory file locks on host paths

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hostns_core::constants::FILE_LOCK_RETRY_INTERVAL;
use hostns_core::{Error, Namespace, Result};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, info};

use crate::joiner::{JoinOutput, JoinerFactory, NamespaceJoinerFactory};

/// Exclusive flock(2) on a path that may live in another mount namespace
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use hostns_namespace::FileLock;
///
/// # async fn demo() -> hostns_core::Result<()> {
/// let mut lock = FileLock::new("/var/lib/longhorn/.lock", Duration::from_secs(5))
///     .in_namespace("/host/proc/1/ns");
///
/// lock.lock().await?;
/// // ... critical section ...
/// lock.unlock()?;
/// # Ok(())
/// # }
/// ```
pub struct FileLock {
    path: PathBuf,
    timeout: Duration,
    namespace_directory: Option<PathBuf>,
    factory: Arc<dyn JoinerFactory>,
    lock: Option<Flock<File>>,
}

impl FileLock {
    /// Lock `path` from the current mount namespace
    ///
    /// A zero `timeout` retries until the lock is acquired.
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            namespace_directory: None,
            factory: Arc::new(NamespaceJoinerFactory),
            lock: None,
        }
    }

    /// Open the file from the mount namespace under `dir`
    #[must_use]
    pub fn in_namespace(mut self, dir: impl Into<PathBuf>) -> Self {
        self.namespace_directory = Some(dir.into());
        self
    }

    /// Replace the joiner factory
    #[must_use]
    pub fn with_joiner_factory(mut self, factory: Arc<dyn JoinerFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Locked path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the lock is currently held
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Acquire the lock, retrying until the timeout elapses
    ///
    /// # Errors
    /// - [`Error::Timeout`] if another holder keeps the lock
    /// - [`Error::IoAt`] if the file cannot be opened
    /// - [`Error::InvalidConfig`] if this lock is already held
    pub async fn lock(&mut self) -> Result<()> {
        if self.lock.is_some() {
            return Err(Error::InvalidConfig {
                message: format!("lock on {} is already held", self.path.display()),
            });
        }

        let path = self.path.clone();
        let timeout = self.timeout;

        let output = self
            .factory
            .joiner(
                self.namespace_directory.as_deref(),
                &[Namespace::Mount],
                timeout,
            )
            .run(Box::new(move || acquire(&path, timeout).map(JoinOutput::Lock)))
            .await?;

        self.lock = Some(output.into_lock()?);
        info!(path = %self.path.display(), "Acquired file lock");
        Ok(())
    }

    /// Release the lock and close the file
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] when no lock is held.
    pub fn unlock(&mut self) -> Result<()> {
        let lock = self.lock.take().ok_or_else(|| Error::NotFound {
            kind: "file lock",
            id: self.path.display().to_string(),
        })?;

        lock.unlock().map_err(|(_, errno)| Error::System(errno))?;
        info!(path = %self.path.display(), "Released file lock");
        Ok(())
    }

    /// Close the file without unlocking; the kernel drops the lock
    pub fn close(&mut self) {
        if self.lock.take().is_some() {
            debug!(path = %self.path.display(), "Closed locked file");
        }
    }
}

impl fmt::Debug for FileLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLock")
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .field("namespace_directory", &self.namespace_directory)
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// Open `path` and retry a non-blocking exclusive flock until `timeout`
fn acquire(path: &Path, timeout: Duration) -> Result<Flock<File>> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| Error::io_at(path, e))?;

    let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);

    loop {
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => return Ok(lock),
            Err((returned, Errno::EAGAIN)) => file = returned,
            Err((_, errno)) => return Err(Error::io_at(path, errno.into())),
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Error::Timeout {
                operation: format!("acquiring lock on {}", path.display()),
                timeout,
            });
        }

        debug!(path = %path.display(), "File lock busy, retrying");
        thread::sleep(FILE_LOCK_RETRY_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");

        let held = acquire(&path, Duration::ZERO).unwrap();
        let err = acquire(&path, Duration::from_millis(250)).unwrap_err();
        assert!(err.to_string().starts_with("timeout acquiring lock"));

        drop(held);
        assert!(acquire(&path, Duration::from_millis(250)).is_ok());
    }

    #[test]
    fn test_acquire_does_not_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");
        std::fs::write(&path, "holder-id").unwrap();

        let _lock = acquire(&path, Duration::ZERO).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "holder-id");
    }

    #[test]
    fn test_debug_hides_handle() {
        let lock = FileLock::new("/tmp/x.lock", Duration::ZERO);
        let debug = format!("{lock:?}");
        assert!(debug.contains("locked: false"));
    }
}
