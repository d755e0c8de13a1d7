//! Well-known paths, process names and timeouts

use std::time::Duration;

/// Proc directory of the current mount namespace
pub const PROC_DIR: &str = "/proc";

/// Host proc tree bind-mounted into the agent container
pub const HOST_PROC_DIR: &str = "/host/proc";

/// Process name meaning "join the host root namespaces"
pub const PROCESS_NONE: &str = "none";

/// Process whose namespaces are joined on distributions where pid 1 is unusable
pub const PROCESS_KUBELET: &str = "kubelet";

/// `ID` value of Talos Linux in os-release
pub const OS_RELEASE_TALOS: &str = "talos";

/// OS identification file
pub const OS_RELEASE_FILE: &str = "/etc/os-release";

/// Block device class directory in sysfs
pub const SYS_CLASS_BLOCK_DIR: &str = "/sys/class/block";

/// Mount table of the current mount namespace
pub const PROC_MOUNTS_FILE: &str = "/proc/mounts";

/// Directory holding `config-<release>` kernel configs
pub const BOOT_DIR: &str = "/boot";

/// Compressed kernel config under the proc directory
pub const KERNEL_CONFIG_GZ: &str = "config.gz";

/// LUKS management tool
pub const BINARY_CRYPTSETUP: &str = "cryptsetup";

/// Default timeout for cryptsetup invocations
pub const LUKS_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for command execution
pub const EXECUTE_DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sentinel for "wait until the command finishes"
pub const EXECUTE_NO_TIMEOUT: Duration = Duration::ZERO;

/// Interval between non-blocking lock attempts
pub const FILE_LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);
