//! Running work inside the namespaces of another process
//!
//! Namespace membership belongs to a thread, so a [`Joiner`] never switches a
//! thread it does not own. Each joined run gets a freshly spawned OS thread
//! that opens the target namespace files, calls setns(2) for each of them,
//! runs the work, switches back and then exits. The caller only holds the
//! receiving end of a oneshot channel and waits on it with a timeout.
//!
//! A timeout is not a cancellation. The worker keeps going and its result is
//! dropped when it finally tries to send it.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use hostns_core::{BlockDeviceInfo, DiskStat, Error, FileInfo, Namespace, Result};
use nix::fcntl::Flock;
use nix::sched::{CloneFlags, setns, unshare};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Namespace files of the calling thread
const THREAD_SELF_NS_DIR: &str = "/proc/thread-self/ns";

const WORKER_THREAD_NAME: &str = "hostns-join";

/// Result of a unit of work run through a [`Join`]
pub enum JoinOutput {
    /// No value
    Unit,
    /// Command output or file content
    Text(String),
    /// A single path
    Path(PathBuf),
    /// A list of paths
    Paths(Vec<PathBuf>),
    /// Filesystem statistics
    DiskStat(DiskStat),
    /// Block devices keyed by name
    BlockDevices(HashMap<String, BlockDeviceInfo>),
    /// Metadata of one file
    FileInfo(FileInfo),
    /// Metadata of directory entries
    Entries(Vec<FileInfo>),
    /// Kernel config key/value pairs
    ConfigMap(HashMap<String, String>),
    /// An acquired advisory lock
    Lock(Flock<File>),
}

macro_rules! into_variant {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(self) -> Result<$ty> {
            match self {
                Self::$variant(value) => Ok(value),
                other => Err(Error::TypeMismatch {
                    expected: stringify!($variant),
                    actual: other.kind(),
                }),
            }
        }
    };
}

impl JoinOutput {
    /// Variant name, used in mismatch errors
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "Unit",
            Self::Text(_) => "Text",
            Self::Path(_) => "Path",
            Self::Paths(_) => "Paths",
            Self::DiskStat(_) => "DiskStat",
            Self::BlockDevices(_) => "BlockDevices",
            Self::FileInfo(_) => "FileInfo",
            Self::Entries(_) => "Entries",
            Self::ConfigMap(_) => "ConfigMap",
            Self::Lock(_) => "Lock",
        }
    }

    /// Expect [`JoinOutput::Unit`]
    pub fn into_unit(self) -> Result<()> {
        match self {
            Self::Unit => Ok(()),
            other => Err(Error::TypeMismatch {
                expected: "Unit",
                actual: other.kind(),
            }),
        }
    }

    into_variant!(
        /// Expect [`JoinOutput::Text`]
        into_text, Text, String
    );
    into_variant!(
        /// Expect [`JoinOutput::Path`]
        into_path, Path, PathBuf
    );
    into_variant!(
        /// Expect [`JoinOutput::Paths`]
        into_paths, Paths, Vec<PathBuf>
    );
    into_variant!(
        /// Expect [`JoinOutput::DiskStat`]
        into_disk_stat, DiskStat, DiskStat
    );
    into_variant!(
        /// Expect [`JoinOutput::BlockDevices`]
        into_block_devices, BlockDevices, HashMap<String, BlockDeviceInfo>
    );
    into_variant!(
        /// Expect [`JoinOutput::FileInfo`]
        into_file_info, FileInfo, FileInfo
    );
    into_variant!(
        /// Expect [`JoinOutput::Entries`]
        into_entries, Entries, Vec<FileInfo>
    );
    into_variant!(
        /// Expect [`JoinOutput::ConfigMap`]
        into_config_map, ConfigMap, HashMap<String, String>
    );
    into_variant!(
        /// Expect [`JoinOutput::Lock`]
        into_lock, Lock, Flock<File>
    );
}

impl fmt::Debug for JoinOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Boxed unit of work accepted by [`Join::run`]
pub type Work = Box<dyn FnOnce() -> Result<JoinOutput> + Send + 'static>;

/// One namespace join + work + restore cycle
///
/// This allows for different implementations:
/// - [`Joiner`] - Real setns(2) on a dedicated thread
/// - [`crate::fake::FakeJoiner`] - Canned results for testing
#[async_trait]
pub trait Join: Send + Sync {
    /// Run `work` in the target namespaces
    async fn run(&self, work: Work) -> Result<JoinOutput>;
}

/// Builds a [`Join`] per logical operation
pub trait JoinerFactory: Send + Sync {
    /// Create a joiner for `namespaces` under `namespace_directory`
    ///
    /// `None` or an empty namespace list means the work runs in the
    /// caller's namespaces.
    fn joiner(
        &self,
        namespace_directory: Option<&Path>,
        namespaces: &[Namespace],
        timeout: Duration,
    ) -> Box<dyn Join>;
}

/// Factory for real [`Joiner`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct NamespaceJoinerFactory;

impl JoinerFactory for NamespaceJoinerFactory {
    fn joiner(
        &self,
        namespace_directory: Option<&Path>,
        namespaces: &[Namespace],
        timeout: Duration,
    ) -> Box<dyn Join> {
        Box::new(Joiner::new(
            namespace_directory.map(Path::to_path_buf),
            namespaces,
            timeout,
        ))
    }
}

/// Runs work inside the namespaces found under a `/proc/<pid>/ns` directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joiner {
    namespace_directory: Option<PathBuf>,
    namespaces: Vec<Namespace>,
    timeout: Duration,
}

impl Joiner {
    /// Create a joiner; a zero `timeout` waits forever
    #[must_use]
    pub fn new(
        namespace_directory: Option<PathBuf>,
        namespaces: &[Namespace],
        timeout: Duration,
    ) -> Self {
        Self {
            namespace_directory,
            namespaces: Namespace::join_order(namespaces),
            timeout,
        }
    }

    /// Joiner that runs work in the caller's namespaces
    #[must_use]
    pub const fn current(timeout: Duration) -> Self {
        Self {
            namespace_directory: None,
            namespaces: Vec::new(),
            timeout,
        }
    }

    /// Target namespace directory, if any
    #[must_use]
    pub fn namespace_directory(&self) -> Option<&Path> {
        self.namespace_directory.as_deref()
    }

    /// Namespaces joined, in join order
    #[must_use]
    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Caller-side timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a run switches namespaces at all
    #[must_use]
    pub fn joins(&self) -> bool {
        self.namespace_directory.is_some() && !self.namespaces.is_empty()
    }

    /// Run `work` inside the target namespaces
    ///
    /// # Errors
    /// - [`Error::Join`] when a namespace file cannot be opened or joined
    /// - [`Error::Timeout`] when the timeout elapses first; the work keeps
    ///   running and its result is discarded
    /// - [`Error::WorkerLost`] when the worker dies without a result
    /// - whatever `work` itself returns
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let Some(dir) = self
            .namespace_directory
            .as_ref()
            .filter(|_| !self.namespaces.is_empty())
        else {
            return self.run_here(work).await;
        };

        debug!(
            path = %dir.display(),
            namespaces = ?self.namespaces,
            timeout = ?self.timeout,
            "Spawning namespace worker"
        );

        let (tx, rx) = oneshot::channel();
        let worker_dir = dir.clone();
        let namespaces = self.namespaces.clone();

        thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let result = run_joined(&worker_dir, &namespaces, work);
                if tx.send(result).is_err() {
                    debug!(
                        path = %worker_dir.display(),
                        "Caller stopped waiting, dropping namespace worker result"
                    );
                }
            })?;

        let received = if self.timeout.is_zero() {
            rx.await
        } else if let Ok(received) = tokio::time::timeout(self.timeout, rx).await {
            received
        } else {
            warn!(
                path = %dir.display(),
                timeout = ?self.timeout,
                "Timed out waiting for namespace worker"
            );
            return Err(Error::Timeout {
                operation: format!("waiting for namespace worker on {}", dir.display()),
                timeout: self.timeout,
            });
        };

        received.map_err(|_| Error::WorkerLost)?
    }

    /// No namespaces to join: run on the blocking pool, same timeout
    async fn run_here<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(work);

        if self.timeout.is_zero() {
            return handle.await?;
        }

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(joined) => joined?,
            Err(_) => Err(Error::Timeout {
                operation: "waiting for work in current namespaces".to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

#[async_trait]
impl Join for Joiner {
    async fn run(&self, work: Work) -> Result<JoinOutput> {
        Self::run(self, work).await
    }
}

/// An opened `ns/<kind>` file
struct NamespaceFile {
    namespace: Namespace,
    path: PathBuf,
    file: File,
}

fn open_namespaces(dir: &Path, namespaces: &[Namespace]) -> Result<Vec<NamespaceFile>> {
    namespaces
        .iter()
        .map(|&namespace| {
            let path = dir.join(namespace.file_name());
            File::open(&path)
                .map(|file| NamespaceFile {
                    namespace,
                    path: path.clone(),
                    file,
                })
                .map_err(|source| {
                    error!(
                        namespace = %namespace,
                        path = %path.display(),
                        error = %source,
                        "Failed to open namespace file"
                    );
                    Error::Join {
                        namespace,
                        path,
                        source,
                    }
                })
        })
        .collect()
}

/// Switches the worker back to its original namespaces when dropped
struct Restore {
    originals: Vec<NamespaceFile>,
    joined: usize,
}

impl Drop for Restore {
    fn drop(&mut self) {
        for original in self.originals[..self.joined].iter().rev() {
            if let Err(source) = setns(original.file.as_fd(), original.namespace.clone_flag()) {
                let err = Error::Restore {
                    namespace: original.namespace,
                    source,
                };
                warn!(error = %err, "Namespace worker not restored, retiring it");
            }
        }
    }
}

/// Entire join sequence, on the worker thread
fn run_joined<T>(dir: &Path, namespaces: &[Namespace], work: impl FnOnce() -> Result<T>) -> Result<T> {
    let targets = open_namespaces(dir, namespaces)?;
    let originals = open_namespaces(Path::new(THREAD_SELF_NS_DIR), namespaces)?;

    if namespaces.contains(&Namespace::Mount) {
        unshare(CloneFlags::CLONE_FS).map_err(|e| Error::Join {
            namespace: Namespace::Mount,
            path: dir.join(Namespace::Mount.file_name()),
            source: e.into(),
        })?;
    }

    let mut restore = Restore {
        originals,
        joined: 0,
    };

    for target in &targets {
        setns(target.file.as_fd(), target.namespace.clone_flag()).map_err(|e| {
            error!(
                namespace = %target.namespace,
                path = %target.path.display(),
                error = %e,
                "Failed to join namespace"
            );
            Error::Join {
                namespace: target.namespace,
                path: target.path.clone(),
                source: e.into(),
            }
        })?;
        restore.joined += 1;
    }

    debug!(path = %dir.display(), "Joined namespaces");

    work()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_join_output_accessors() {
        assert_eq!(
            JoinOutput::Text("x".to_string()).into_text().unwrap(),
            "x"
        );
        assert!(JoinOutput::Unit.into_unit().is_ok());

        let err = JoinOutput::Unit.into_disk_stat().unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: "DiskStat",
                actual: "Unit"
            }
        ));
    }

    #[test]
    fn test_joiner_sorts_namespaces() {
        let joiner = Joiner::new(
            Some(PathBuf::from("/proc/1/ns")),
            &[Namespace::Mount, Namespace::Network],
            Duration::ZERO,
        );

        assert_eq!(joiner.namespaces(), &[Namespace::Network, Namespace::Mount]);
        assert!(joiner.joins());
        assert!(!Joiner::current(Duration::ZERO).joins());
    }

    #[tokio::test]
    async fn test_current_runs_work() {
        let value = Joiner::current(Duration::ZERO)
            .run(|| Ok(21 * 2))
            .await
            .unwrap();

        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_current_times_out() {
        let start = Instant::now();
        let err = Joiner::current(Duration::from_millis(100))
            .run(|| {
                thread::sleep(Duration::from_secs(2));
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("timeout"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_missing_namespace_directory_fails_to_join() {
        let joiner = Joiner::new(
            Some(PathBuf::from("/nonexistent/proc/1/ns")),
            &[Namespace::Network],
            Duration::from_secs(5),
        );

        let err = joiner.run(|| Ok(())).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Join {
                namespace: Namespace::Network,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_regular_file_is_not_a_namespace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ipc"), "").unwrap();

        let joiner = Joiner::new(
            Some(dir.path().to_path_buf()),
            &[Namespace::Ipc],
            Duration::from_secs(5),
        );
        let err = joiner.run(|| Ok(())).await.unwrap_err();
        assert!(matches!(err, Error::Join { .. }));
        assert!(err.to_string().contains("ipc namespace"));
    }
}
