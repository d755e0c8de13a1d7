//! Locating host processes and their namespace directories

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hostns_core::constants::{OS_RELEASE_TALOS, PROC_DIR, PROCESS_KUBELET, PROCESS_NONE};
use hostns_core::{Error, Namespace, ProcessId, Result};
use hostns_host::sys;
use tracing::{debug, warn};

use crate::joiner::{JoinOutput, JoinerFactory};

const OS_DISTRO_TIMEOUT: Duration = Duration::from_secs(30);

/// A process found under a proc tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    /// Executable name
    pub name: String,
    /// Process ID
    pub pid: ProcessId,
}

/// Scans a `/proc`-like directory
///
/// Nothing is cached: a target process may restart under a new pid between
/// two lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLocator {
    proc_dir: PathBuf,
}

impl Default for ProcessLocator {
    fn default() -> Self {
        Self::new(PROC_DIR)
    }
}

impl ProcessLocator {
    /// Create a locator over `proc_dir`
    #[must_use]
    pub fn new(proc_dir: impl Into<PathBuf>) -> Self {
        Self {
            proc_dir: proc_dir.into(),
        }
    }

    /// Proc tree being scanned
    #[must_use]
    pub fn proc_dir(&self) -> &Path {
        &self.proc_dir
    }

    /// First process, in ascending pid order, whose executable name is `name`
    ///
    /// The executable name is `comm`, or the basename of `argv[0]` when
    /// `comm` differs (it is truncated to 15 bytes by the kernel).
    pub fn find_process_by_name(&self, name: &str) -> Result<ProcessDescriptor> {
        self.scan()?
            .into_iter()
            .find_map(|pid| {
                self.has_executable_name(pid, name)
                    .then(|| ProcessDescriptor {
                        name: name.to_string(),
                        pid,
                    })
            })
            .ok_or_else(|| Error::NotFound {
                kind: "process",
                id: name.to_string(),
            })
    }

    /// Processes whose space-joined command line contains `pattern`
    pub fn find_processes_by_cmdline(&self, pattern: &str) -> Result<Vec<ProcessDescriptor>> {
        let matches = self
            .scan()?
            .into_iter()
            .filter_map(|pid| {
                let args = self.cmdline(pid);
                if !args.join(" ").contains(pattern) {
                    return None;
                }

                let name = self
                    .comm(pid)
                    .or_else(|| args.first().map(|arg| basename(arg).to_string()))
                    .unwrap_or_default();
                Some(ProcessDescriptor { name, pid })
            })
            .collect();

        Ok(matches)
    }

    /// Pids whose executable name is `name`, or the host root pid if none
    #[must_use]
    pub fn process_pids(&self, name: &str) -> Vec<ProcessId> {
        let pids: Vec<_> = self
            .scan()
            .unwrap_or_default()
            .into_iter()
            .filter(|&pid| self.has_executable_name(pid, name))
            .collect();

        if pids.is_empty() {
            warn!(
                process = name,
                proc_dir = %self.proc_dir.display(),
                "Process not found, falling back to host root pid"
            );
            return vec![self.host_root_pid()];
        }

        pids
    }

    /// `<proc_dir>/<pid>/ns` of `process_name`
    ///
    /// An empty name or `"none"` selects the host root process. A named
    /// process that is not running is [`Error::NotFound`], never the host root.
    pub fn namespace_directory(&self, process_name: &str) -> Result<PathBuf> {
        if process_name.is_empty() || process_name == PROCESS_NONE {
            return Ok(self.host_namespace_directory());
        }

        let process = self.find_process_by_name(process_name)?;
        let dir = self.pid_namespace_directory(process.pid);
        debug!(
            process = process_name,
            pid = %process.pid,
            path = %dir.display(),
            "Resolved namespace directory"
        );
        Ok(dir)
    }

    /// Namespace directory of the host root process
    #[must_use]
    pub fn host_namespace_directory(&self) -> PathBuf {
        self.pid_namespace_directory(self.host_root_pid())
    }

    /// Namespace directory of `pid`
    #[must_use]
    pub fn pid_namespace_directory(&self, pid: ProcessId) -> PathBuf {
        self.proc_dir.join(pid.to_string()).join("ns")
    }

    /// Pid of the host init process; never fails
    #[must_use]
    pub fn host_root_pid(&self) -> ProcessId {
        let root = ProcessId::HOST_ROOT;
        if !self.proc_dir.join(root.to_string()).exists() {
            warn!(
                proc_dir = %self.proc_dir.display(),
                "Host root process not reachable, using pid {root} anyway"
            );
        }
        root
    }

    /// Namespace links of `pid`
    pub fn namespace_info(&self, pid: ProcessId) -> Result<NamespaceInfo> {
        let dir = self.pid_namespace_directory(pid);
        if !dir.is_dir() {
            return Err(Error::NotFound {
                kind: "namespace directory",
                id: dir.display().to_string(),
            });
        }

        let links = Namespace::ALL
            .into_iter()
            .filter_map(|ns| {
                fs::read_link(dir.join(ns.file_name()))
                    .ok()
                    .map(|link| (ns, link.to_string_lossy().into_owned()))
            })
            .collect();

        Ok(NamespaceInfo { pid, links })
    }

    /// Numeric entries, ascending
    fn scan(&self) -> Result<Vec<ProcessId>> {
        let entries =
            fs::read_dir(&self.proc_dir).map_err(|e| Error::io_at(&self.proc_dir, e))?;

        let mut pids: Vec<ProcessId> = entries
            .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort();
        Ok(pids)
    }

    fn comm(&self, pid: ProcessId) -> Option<String> {
        fs::read_to_string(self.proc_dir.join(pid.to_string()).join("comm"))
            .ok()
            .map(|comm| comm.trim_end_matches('\n').to_string())
            .filter(|comm| !comm.is_empty())
    }

    fn cmdline(&self, pid: ProcessId) -> Vec<String> {
        fs::read(self.proc_dir.join(pid.to_string()).join("cmdline"))
            .map(|raw| {
                raw.split(|&b| b == 0)
                    .filter(|arg| !arg.is_empty())
                    .map(|arg| String::from_utf8_lossy(arg).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn has_executable_name(&self, pid: ProcessId, name: &str) -> bool {
        if self.comm(pid).is_some_and(|comm| comm == name) {
            return true;
        }
        self.cmdline(pid)
            .first()
            .is_some_and(|arg0| basename(arg0) == name)
    }
}

fn basename(arg: &str) -> &str {
    arg.rsplit('/').next().unwrap_or(arg)
}

/// Namespace links of one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// Process the links belong to
    pub pid: ProcessId,
    /// `ns/<kind>` link targets such as `net:[4026531840]`
    pub links: Vec<(Namespace, String)>,
}

impl NamespaceInfo {
    /// Link of one namespace kind
    #[must_use]
    pub fn link(&self, namespace: Namespace) -> Option<&str> {
        self.links
            .iter()
            .find(|(ns, _)| *ns == namespace)
            .map(|(_, link)| link.as_str())
    }

    /// Namespace kinds whose links differ from `other`
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> Vec<Namespace> {
        self.links
            .iter()
            .filter(|(ns, link)| other.link(*ns).is_some_and(|theirs| theirs != link.as_str()))
            .map(|(ns, _)| *ns)
            .collect()
    }
}

impl fmt::Display for NamespaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Namespace Info (pid {}):", self.pid)?;
        for (ns, link) in &self.links {
            writeln!(f, "  {:<6}{link}", format!("{}:", ns.file_name().to_uppercase()))?;
        }
        Ok(())
    }
}

/// Process whose namespaces should be joined by default on this host
///
/// Reads the host os-release through the host root mount namespace. Talos
/// hosts map to `kubelet`; anything else, including a failed read, maps to
/// `"none"`.
pub async fn default_process_name(factory: &dyn JoinerFactory, proc_dir: &Path) -> String {
    let dir = ProcessLocator::new(proc_dir).host_namespace_directory();
    let joiner = factory.joiner(Some(dir.as_path()), &[Namespace::Mount], OS_DISTRO_TIMEOUT);

    let distro = joiner
        .run(Box::new(|| sys::get_os_distro().map(JoinOutput::Text)))
        .await
        .and_then(JoinOutput::into_text);

    match distro {
        Ok(distro) if distro == OS_RELEASE_TALOS => PROCESS_KUBELET.to_string(),
        Ok(distro) => {
            debug!(distro = %distro, "Using host root namespaces");
            PROCESS_NONE.to_string()
        }
        Err(e) => {
            warn!(error = %e, "Failed to detect host OS distro, using host root namespaces");
            PROCESS_NONE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_process(proc_dir: &Path, pid: i32, comm: &str, cmdline: &[&str]) {
        let dir = proc_dir.join(pid.to_string());
        fs::create_dir_all(dir.join("ns")).unwrap();
        fs::write(dir.join("comm"), format!("{comm}\n")).unwrap();
        let mut raw = cmdline.join("\0");
        raw.push('\0');
        fs::write(dir.join("cmdline"), raw).unwrap();
    }

    fn fake_proc() -> tempfile::TempDir {
        let proc_dir = tempfile::tempdir().unwrap();
        fake_process(proc_dir.path(), 1, "systemd", &["/sbin/init", "splash"]);
        fake_process(
            proc_dir.path(),
            250,
            "kubelet",
            &["/usr/bin/kubelet", "--config=/var/lib/kubelet/config.yaml"],
        );
        fake_process(
            proc_dir.path(),
            31,
            "python3",
            &["/usr/bin/python3", "/opt/agent/longhorn-manager.py"],
        );
        fake_process(proc_dir.path(), 400, "kubelet", &["kubelet"]);
        fs::create_dir(proc_dir.path().join("self")).unwrap();
        proc_dir
    }

    #[test]
    fn test_find_process_by_name() {
        let proc_dir = fake_proc();
        let locator = ProcessLocator::new(proc_dir.path());

        let process = locator.find_process_by_name("kubelet").unwrap();
        assert_eq!(process.pid, ProcessId::from_raw(250));

        let process = locator.find_process_by_name("init").unwrap();
        assert_eq!(process.pid, ProcessId::HOST_ROOT);

        let err = locator.find_process_by_name("dockerd").unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "process", .. }));
    }

    #[test]
    fn test_find_processes_by_cmdline() {
        let proc_dir = fake_proc();
        let locator = ProcessLocator::new(proc_dir.path());

        let found = locator.find_processes_by_cmdline("longhorn-manager").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pid, ProcessId::from_raw(31));
        assert_eq!(found[0].name, "python3");

        let found = locator.find_processes_by_cmdline("--config=/var/lib").unwrap();
        assert_eq!(found.len(), 1);

        assert!(locator.find_processes_by_cmdline("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_process_pids() {
        let proc_dir = fake_proc();
        let locator = ProcessLocator::new(proc_dir.path());

        assert_eq!(
            locator.process_pids("kubelet"),
            vec![ProcessId::from_raw(250), ProcessId::from_raw(400)]
        );
        assert_eq!(locator.process_pids("dockerd"), vec![ProcessId::HOST_ROOT]);
    }

    #[test]
    fn test_namespace_directory() {
        let proc_dir = fake_proc();
        let locator = ProcessLocator::new(proc_dir.path());

        let root = proc_dir.path().join("1").join("ns");
        assert_eq!(locator.namespace_directory("").unwrap(), root);
        assert_eq!(locator.namespace_directory("none").unwrap(), root);
        assert_eq!(
            locator.namespace_directory("kubelet").unwrap(),
            proc_dir.path().join("250").join("ns")
        );
        assert!(locator.namespace_directory("dockerd").is_err());
    }

    #[test]
    fn test_host_root_pid_never_fails() {
        let locator = ProcessLocator::new("/nonexistent/proc");

        assert_eq!(locator.host_root_pid(), ProcessId::HOST_ROOT);
        assert_eq!(
            locator.namespace_directory("none").unwrap(),
            PathBuf::from("/nonexistent/proc/1/ns")
        );
    }

    #[test]
    fn test_namespace_info_of_current_process() {
        let locator = ProcessLocator::default();
        let info = locator.namespace_info(ProcessId::current()).unwrap();

        assert!(info.link(Namespace::Network).is_some());
        assert!(info.differs_from(&info).is_empty());
    }

    #[test]
    fn test_namespace_info_display() {
        let info = NamespaceInfo {
            pid: ProcessId::from_raw(7),
            links: vec![
                (Namespace::Pid, "pid:[4026531836]".to_string()),
                (Namespace::Network, "net:[4026531905]".to_string()),
            ],
        };

        let display = format!("{info}");
        assert!(display.contains("PID:"));
        assert!(display.contains("NET:"));
        assert!(display.contains("pid 7"));
    }

    #[test]
    fn test_differs_from() {
        let ours = NamespaceInfo {
            pid: ProcessId::from_raw(7),
            links: vec![
                (Namespace::Mount, "mnt:[1]".to_string()),
                (Namespace::Network, "net:[2]".to_string()),
            ],
        };
        let host = NamespaceInfo {
            pid: ProcessId::HOST_ROOT,
            links: vec![
                (Namespace::Mount, "mnt:[9]".to_string()),
                (Namespace::Network, "net:[2]".to_string()),
            ],
        };

        assert_eq!(ours.differs_from(&host), vec![Namespace::Mount]);
    }
}
