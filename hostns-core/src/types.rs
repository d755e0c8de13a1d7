//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

use nix::sched::CloneFlags;

use crate::{Error, Result};

/// A Linux namespace kind that can be joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Namespace {
    /// IPC namespace
    Ipc,
    /// Mount namespace
    Mount,
    /// Network namespace
    Network,
    /// PID namespace (affects children only)
    Pid,
    /// UTS namespace (hostname)
    Uts,
    /// User namespace
    User,
}

impl Namespace {
    /// Every namespace kind, in declaration order
    pub const ALL: [Self; 6] = [
        Self::Ipc,
        Self::Mount,
        Self::Network,
        Self::Pid,
        Self::Uts,
        Self::User,
    ];

    /// Name of the file under `/proc/<pid>/ns`
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Ipc => "ipc",
            Self::Mount => "mnt",
            Self::Network => "net",
            Self::Pid => "pid",
            Self::Uts => "uts",
            Self::User => "user",
        }
    }

    /// Flag passed to setns(2)
    #[must_use]
    pub const fn clone_flag(self) -> CloneFlags {
        match self {
            Self::Ipc => CloneFlags::CLONE_NEWIPC,
            Self::Mount => CloneFlags::CLONE_NEWNS,
            Self::Network => CloneFlags::CLONE_NEWNET,
            Self::Pid => CloneFlags::CLONE_NEWPID,
            Self::Uts => CloneFlags::CLONE_NEWUTS,
            Self::User => CloneFlags::CLONE_NEWUSER,
        }
    }

    /// Position in the join sequence.
    ///
    /// The mount namespace is always joined last: once it is switched, paths
    /// under the caller's `/proc` may no longer resolve.
    #[must_use]
    pub const fn join_rank(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Ipc => 1,
            Self::Uts => 2,
            Self::Network => 3,
            Self::Pid => 4,
            Self::Mount => 5,
        }
    }

    /// Sort and deduplicate `namespaces` into join order
    #[must_use]
    pub fn join_order(namespaces: &[Self]) -> Vec<Self> {
        let mut ordered = namespaces.to_vec();
        ordered.sort_by_key(|ns| ns.join_rank());
        ordered.dedup();
        ordered
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ipc" => Ok(Self::Ipc),
            "mnt" | "mount" => Ok(Self::Mount),
            "net" | "network" => Ok(Self::Network),
            "pid" => Ok(Self::Pid),
            "uts" => Ok(Self::Uts),
            "user" => Ok(Self::User),
            other => Err(Error::InvalidConfig {
                message: format!("unknown namespace kind: {other}"),
            }),
        }
    }
}

impl TryFrom<String> for Namespace {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.file_name().to_string()
    }
}

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// PID of the host init process
    pub const HOST_ROOT: Self = Self(1);

    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        #[allow(clippy::cast_possible_wrap)]
        Self(std::process::id() as i32)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<i32>()
            .ok()
            .filter(|pid| *pid > 0)
            .map(Self)
            .ok_or_else(|| Error::Parse {
                message: format!("invalid pid: {s}"),
            })
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

/// Filesystem statistics for a path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskStat {
    /// Filesystem identifier, `f_fsid` in the hex form `stat -f -c %i` prints
    pub disk_id: String,
    /// Path that was queried
    pub path: PathBuf,
    /// Filesystem type name
    pub fs_type: String,
    /// Free blocks
    pub free_blocks: u64,
    /// Total blocks
    pub total_blocks: u64,
    /// Size of one block in bytes
    pub block_size: u64,
    /// Total capacity in bytes
    pub storage_maximum: u64,
    /// Free capacity in bytes
    pub storage_available: u64,
}

/// A block device listed under `/sys/class/block`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockDeviceInfo {
    /// Kernel device name (e.g. `sda`)
    pub name: String,
    /// Major number
    pub major: u32,
    /// Minor number
    pub minor: u32,
}

/// Metadata of a file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Path of the entry
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Unix permission bits
    pub mode: u32,
    /// Last modification time
    pub modified: SystemTime,
}
