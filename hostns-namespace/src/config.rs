//! Namespace executor configuration

use std::path::PathBuf;
use std::time::Duration;

use hostns_core::Namespace;
use hostns_core::constants::{HOST_PROC_DIR, PROCESS_NONE};
use serde::{Deserialize, Serialize};

/// Which host namespaces to join, and whose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Join the IPC namespace
    pub ipc: bool,

    /// Join the mount namespace
    pub mount: bool,

    /// Join the network namespace
    pub network: bool,

    /// Join the PID namespace (affects spawned children only)
    pub pid: bool,

    /// Join the UTS namespace
    pub uts: bool,

    /// Join the user namespace
    pub user: bool,

    /// Process whose namespaces are joined; `"none"` means the host root
    pub process_name: String,

    /// Proc tree used to locate the process
    pub proc_dir: PathBuf,

    /// How long a caller waits for one join; zero waits forever
    pub join_timeout: Duration,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            ipc: true,
            mount: true,
            network: true,
            pid: false,
            uts: false,
            user: false,
            process_name: PROCESS_NONE.to_string(),
            proc_dir: PathBuf::from(HOST_PROC_DIR),
            join_timeout: Duration::ZERO,
        }
    }
}

impl NamespaceConfig {
    /// Create a new namespace configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount, network and IPC namespaces of the host root process
    #[must_use]
    pub fn host() -> Self {
        Self::default()
    }

    /// Join nothing; every operation runs in the caller's namespaces
    #[must_use]
    pub fn none() -> Self {
        Self::default().with_namespaces(&[])
    }

    /// Enable exactly the given namespaces
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: &[Namespace]) -> Self {
        self.ipc = namespaces.contains(&Namespace::Ipc);
        self.mount = namespaces.contains(&Namespace::Mount);
        self.network = namespaces.contains(&Namespace::Network);
        self.pid = namespaces.contains(&Namespace::Pid);
        self.uts = namespaces.contains(&Namespace::Uts);
        self.user = namespaces.contains(&Namespace::User);
        self
    }

    /// Join the IPC namespace
    #[must_use]
    pub const fn with_ipc(mut self, enable: bool) -> Self {
        self.ipc = enable;
        self
    }

    /// Join the mount namespace
    #[must_use]
    pub const fn with_mount(mut self, enable: bool) -> Self {
        self.mount = enable;
        self
    }

    /// Join the network namespace
    #[must_use]
    pub const fn with_network(mut self, enable: bool) -> Self {
        self.network = enable;
        self
    }

    /// Join the PID namespace
    #[must_use]
    pub const fn with_pid(mut self, enable: bool) -> Self {
        self.pid = enable;
        self
    }

    /// Join the UTS namespace
    #[must_use]
    pub const fn with_uts(mut self, enable: bool) -> Self {
        self.uts = enable;
        self
    }

    /// Join the user namespace
    #[must_use]
    pub const fn with_user(mut self, enable: bool) -> Self {
        self.user = enable;
        self
    }

    /// Set the process whose namespaces are joined
    #[must_use]
    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = name.into();
        self
    }

    /// Set the proc tree used for process lookup
    #[must_use]
    pub fn with_proc_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.proc_dir = dir.into();
        self
    }

    /// Set the per-join timeout
    #[must_use]
    pub const fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Enabled namespaces, in join order
    #[must_use]
    pub fn enabled_namespaces(&self) -> Vec<Namespace> {
        let flags = [
            (self.ipc, Namespace::Ipc),
            (self.mount, Namespace::Mount),
            (self.network, Namespace::Network),
            (self.pid, Namespace::Pid),
            (self.uts, Namespace::Uts),
            (self.user, Namespace::User),
        ];

        let enabled: Vec<_> = flags
            .into_iter()
            .filter_map(|(enabled, ns)| enabled.then_some(ns))
            .collect();

        Namespace::join_order(&enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NamespaceConfig::default();
        assert!(config.ipc);
        assert!(config.mount);
        assert!(config.network);
        assert!(!config.pid);
        assert!(!config.user);
        assert_eq!(config.process_name, "none");
        assert_eq!(config.proc_dir, PathBuf::from("/host/proc"));
        assert_eq!(config.join_timeout, Duration::ZERO);
    }

    #[test]
    fn test_builder_pattern() {
        let config = NamespaceConfig::new()
            .with_pid(true)
            .with_network(false)
            .with_process_name("kubelet")
            .with_join_timeout(Duration::from_secs(3));

        assert!(config.pid);
        assert!(!config.network);
        assert_eq!(config.process_name, "kubelet");
        assert_eq!(config.join_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_enabled_namespaces_mount_last() {
        let enabled = NamespaceConfig::host().with_uts(true).enabled_namespaces();

        assert_eq!(
            enabled,
            vec![
                Namespace::Ipc,
                Namespace::Uts,
                Namespace::Network,
                Namespace::Mount
            ]
        );
    }

    #[test]
    fn test_none_config() {
        let config = NamespaceConfig::none();

        assert!(config.enabled_namespaces().is_empty());
    }

    #[test]
    fn test_with_namespaces() {
        let config = NamespaceConfig::none().with_namespaces(&[Namespace::Network, Namespace::Pid]);

        assert!(config.network);
        assert!(config.pid);
        assert!(!config.mount);
    }
}
