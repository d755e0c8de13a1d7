//! Host operations executed inside the namespaces of a host process

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use hostns_core::constants::HOST_PROC_DIR;
use hostns_core::{BlockDeviceInfo, DiskStat, FileInfo, Namespace, Result};
use hostns_host::{CommandExecutor, Executor, fs, sys};
use tracing::{debug, info};

use crate::config::NamespaceConfig;
use crate::filelock::FileLock;
use crate::joiner::{JoinOutput, JoinerFactory, NamespaceJoinerFactory};
use crate::proc::ProcessLocator;

/// Runs commands and host queries as if issued on the host
///
/// Long-lived and shared; every call builds a fresh joiner through the
/// configured [`JoinerFactory`].
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use hostns_namespace::{NamespaceConfig, NamespaceExecutor};
///
/// # async fn demo() -> hostns_core::Result<()> {
/// let executor = NamespaceExecutor::new(NamespaceConfig::host())?;
/// let output = executor
///     .execute(&[], "lsblk", &["-J".to_string()], Duration::from_secs(10))
///     .await?;
/// println!("{output}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NamespaceExecutor {
    factory: Arc<dyn JoinerFactory>,
    executor: Arc<dyn CommandExecutor>,
    process_name: String,
    proc_dir: PathBuf,
    namespaces: Vec<Namespace>,
    namespace_directory: Option<PathBuf>,
    join_timeout: Duration,
}

impl NamespaceExecutor {
    /// Create an executor targeting the process named in `config`
    ///
    /// # Errors
    /// Returns [`hostns_core::Error::NotFound`] if the named process is not
    /// running.
    pub fn new(config: NamespaceConfig) -> Result<Self> {
        let namespaces = config.enabled_namespaces();

        let namespace_directory = if namespaces.is_empty() {
            debug!("No namespaces enabled, running in current namespaces");
            None
        } else if config.proc_dir == Path::new(HOST_PROC_DIR) && !config.proc_dir.exists() {
            debug!(
                proc_dir = %config.proc_dir.display(),
                "Host proc directory not mounted, assuming host namespaces"
            );
            None
        } else {
            Some(ProcessLocator::new(&config.proc_dir).namespace_directory(&config.process_name)?)
        };

        info!(
            process = %config.process_name,
            namespaces = ?namespaces,
            namespace_directory = ?namespace_directory,
            "Namespace executor ready"
        );

        Ok(Self {
            factory: Arc::new(NamespaceJoinerFactory),
            executor: Arc::new(Executor::new()),
            process_name: config.process_name,
            proc_dir: config.proc_dir,
            namespaces,
            namespace_directory,
            join_timeout: config.join_timeout,
        })
    }

    /// Executor that never joins
    #[must_use]
    pub fn current() -> Self {
        let config = NamespaceConfig::none();
        Self {
            factory: Arc::new(NamespaceJoinerFactory),
            executor: Arc::new(Executor::new()),
            process_name: config.process_name,
            proc_dir: config.proc_dir,
            namespaces: Vec::new(),
            namespace_directory: None,
            join_timeout: config.join_timeout,
        }
    }

    /// Replace the joiner factory
    #[must_use]
    pub fn with_joiner_factory(mut self, factory: Arc<dyn JoinerFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Replace the command executor
    #[must_use]
    pub fn with_command_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Override the target namespace directory
    #[must_use]
    pub fn with_namespace_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.namespace_directory = dir;
        self
    }

    /// Override the namespaces to join
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: &[Namespace]) -> Self {
        self.namespaces = Namespace::join_order(namespaces);
        self
    }

    /// Target process name
    #[must_use]
    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Proc tree the target was looked up in
    #[must_use]
    pub fn proc_dir(&self) -> &Path {
        &self.proc_dir
    }

    /// Namespaces joined per call
    #[must_use]
    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Target namespace directory; `None` runs in current namespaces
    #[must_use]
    pub fn namespace_directory(&self) -> Option<&Path> {
        self.namespace_directory.as_deref()
    }

    /// Per-join timeout
    #[must_use]
    pub const fn join_timeout(&self) -> Duration {
        self.join_timeout
    }

    /// File lock on `path` in this executor's mount namespace
    #[must_use]
    pub fn file_lock(&self, path: impl Into<PathBuf>, timeout: Duration) -> FileLock {
        let lock = FileLock::new(path, timeout).with_joiner_factory(Arc::clone(&self.factory));
        match &self.namespace_directory {
            Some(dir) => lock.in_namespace(dir.clone()),
            None => lock,
        }
    }

    async fn run<F>(&self, work: F) -> Result<JoinOutput>
    where
        F: FnOnce() -> Result<JoinOutput> + Send + 'static,
    {
        self.factory
            .joiner(
                self.namespace_directory.as_deref(),
                &self.namespaces,
                self.join_timeout,
            )
            .run(Box::new(work))
            .await
    }

    /// Run `binary` on the host
    pub async fn execute(
        &self,
        envs: &[String],
        binary: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<String> {
        let executor = Arc::clone(&self.executor);
        let (envs, binary, args) = (envs.to_vec(), binary.to_string(), args.to_vec());

        self.run(move || {
            executor
                .execute(&envs, &binary, &args, timeout)
                .map(JoinOutput::Text)
        })
        .await?
        .into_text()
    }

    /// Run `binary` on the host with `stdin` as its input
    pub async fn execute_with_stdin(
        &self,
        binary: &str,
        args: &[String],
        stdin: &str,
        timeout: Duration,
    ) -> Result<String> {
        let executor = Arc::clone(&self.executor);
        let (binary, args, stdin) = (binary.to_string(), args.to_vec(), stdin.to_string());

        self.run(move || {
            executor
                .execute_with_stdin(&binary, &args, &stdin, timeout)
                .map(JoinOutput::Text)
        })
        .await?
        .into_text()
    }

    /// Run `binary` on the host, piping `stdin` into it
    pub async fn execute_with_stdin_pipe(
        &self,
        envs: &[String],
        binary: &str,
        args: &[String],
        stdin: &str,
        timeout: Duration,
    ) -> Result<String> {
        let executor = Arc::clone(&self.executor);
        let (envs, binary, args, stdin) = (
            envs.to_vec(),
            binary.to_string(),
            args.to_vec(),
            stdin.to_string(),
        );

        self.run(move || {
            executor
                .execute_with_stdin_pipe(&envs, &binary, &args, &stdin, timeout)
                .map(JoinOutput::Text)
        })
        .await?
        .into_text()
    }

    /// Filesystem statistics of `path` on the host
    pub async fn get_disk_stat(&self, path: impl Into<PathBuf>) -> Result<DiskStat> {
        let path = path.into();
        self.run(move || sys::get_disk_stat(&path).map(JoinOutput::DiskStat))
            .await?
            .into_disk_stat()
    }

    /// Host machine architecture
    pub async fn get_arch(&self) -> Result<String> {
        self.run(|| sys::get_arch().map(JoinOutput::Text))
            .await?
            .into_text()
    }

    /// Host kernel release
    pub async fn get_kernel_release(&self) -> Result<String> {
        self.run(|| sys::get_kernel_release().map(JoinOutput::Text))
            .await?
            .into_text()
    }

    /// Host distribution ID from os-release
    pub async fn get_os_distro(&self) -> Result<String> {
        self.run(|| sys::get_os_distro().map(JoinOutput::Text))
            .await?
            .into_text()
    }

    /// Host block devices keyed by name
    pub async fn get_system_block_devices(&self) -> Result<HashMap<String, BlockDeviceInfo>> {
        self.run(|| sys::system_block_devices().map(JoinOutput::BlockDevices))
            .await?
            .into_block_devices()
    }

    /// Flush host filesystem buffers
    pub async fn sync(&self) -> Result<()> {
        self.run(|| {
            sys::sync();
            Ok(JoinOutput::Unit)
        })
        .await?
        .into_unit()
    }

    /// Kernel config from `<boot_dir>/config-<release>` on the host
    pub async fn get_boot_kernel_config(
        &self,
        boot_dir: impl Into<PathBuf>,
        release: &str,
    ) -> Result<HashMap<String, String>> {
        let boot_dir = boot_dir.into();
        let release = release.to_string();
        self.run(move || sys::boot_kernel_config(&boot_dir, &release).map(JoinOutput::ConfigMap))
            .await?
            .into_config_map()
    }

    /// Kernel config from `<proc_dir>/config.gz` on the host
    pub async fn get_proc_kernel_config(
        &self,
        proc_dir: impl Into<PathBuf>,
    ) -> Result<HashMap<String, String>> {
        let proc_dir = proc_dir.into();
        self.run(move || sys::proc_kernel_config(&proc_dir).map(JoinOutput::ConfigMap))
            .await?
            .into_config_map()
    }

    /// Device mounted at `mount_path` on the host
    pub async fn find_block_device_for_mount(
        &self,
        mount_path: impl Into<PathBuf>,
    ) -> Result<PathBuf> {
        let mount_path = mount_path.into();
        self.run(move || sys::find_block_device_for_mount(&mount_path).map(JoinOutput::Path))
            .await?
            .into_path()
    }

    /// Physical disk behind a host block device
    pub async fn resolve_block_device_to_physical_device(
        &self,
        device: impl Into<PathBuf>,
    ) -> Result<PathBuf> {
        let device = device.into();
        self.run(move || {
            sys::resolve_block_device_to_physical_device(&device).map(JoinOutput::Path)
        })
        .await?
        .into_path()
    }

    /// Content of a host file
    pub async fn read_file_content(&self, path: impl Into<PathBuf>) -> Result<String> {
        let path = path.into();
        self.run(move || fs::read_file_content(&path).map(JoinOutput::Text))
            .await?
            .into_text()
    }

    /// Write a host file
    pub async fn write_file(&self, path: impl Into<PathBuf>, content: &str) -> Result<()> {
        let path = path.into();
        let content = content.to_string();
        self.run(move || fs::write_file(&path, &content).map(|()| JoinOutput::Unit))
            .await?
            .into_unit()
    }

    /// Flush a host file to disk
    pub async fn sync_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.run(move || fs::sync_file(&path).map(|()| JoinOutput::Unit))
            .await?
            .into_unit()
    }

    /// Create a host directory with the given modification time
    pub async fn create_directory(
        &self,
        path: impl Into<PathBuf>,
        modified: SystemTime,
    ) -> Result<PathBuf> {
        let path = path.into();
        self.run(move || fs::create_directory(&path, modified).map(JoinOutput::Path))
            .await?
            .into_path()
    }

    /// Recursively copy a host directory
    pub async fn copy_directory(
        &self,
        src: impl Into<PathBuf>,
        dst: impl Into<PathBuf>,
        overwrite: bool,
    ) -> Result<()> {
        let (src, dst) = (src.into(), dst.into());
        self.run(move || fs::copy_directory(&src, &dst, overwrite).map(|()| JoinOutput::Unit))
            .await?
            .into_unit()
    }

    /// Copy a host file or the files of a host directory
    pub async fn copy_files(
        &self,
        src: impl Into<PathBuf>,
        dst: impl Into<PathBuf>,
        overwrite: bool,
    ) -> Result<()> {
        let (src, dst) = (src.into(), dst.into());
        self.run(move || fs::copy_files(&src, &dst, overwrite).map(|()| JoinOutput::Unit))
            .await?
            .into_unit()
    }

    /// Remove a host directory tree
    pub async fn delete_directory(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.run(move || fs::delete_directory(&path).map(|()| JoinOutput::Unit))
            .await?
            .into_unit()
    }

    /// Remove a host file or directory tree
    pub async fn delete_path(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.run(move || fs::delete_path(&path).map(|()| JoinOutput::Unit))
            .await?
            .into_unit()
    }

    /// Entries of a host directory
    pub async fn read_directory(&self, path: impl Into<PathBuf>) -> Result<Vec<FileInfo>> {
        let path = path.into();
        self.run(move || fs::read_directory(&path).map(JoinOutput::Entries))
            .await?
            .into_entries()
    }

    /// Empty files under a host directory
    pub async fn get_empty_files(&self, dir: impl Into<PathBuf>) -> Result<Vec<PathBuf>> {
        let dir = dir.into();
        self.run(move || fs::get_empty_files(&dir).map(JoinOutput::Paths))
            .await?
            .into_paths()
    }

    /// Metadata of a host path
    pub async fn get_file_info(&self, path: impl Into<PathBuf>) -> Result<FileInfo> {
        let path = path.into();
        self.run(move || fs::get_file_info(&path).map(JoinOutput::FileInfo))
            .await?
            .into_file_info()
    }
}

impl fmt::Debug for NamespaceExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceExecutor")
            .field("process_name", &self.process_name)
            .field("proc_dir", &self.proc_dir)
            .field("namespaces", &self.namespaces)
            .field("namespace_directory", &self.namespace_directory)
            .field("join_timeout", &self.join_timeout)
            .finish_non_exhaustive()
    }
}
