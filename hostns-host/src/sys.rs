//! Host system queries: kernel, os-release, block devices, filesystems
//!
//! Everything here acts on the namespaces of the calling thread. Run it inside
//! a namespace join to get the answer of the joined host.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use hostns_core::constants::{
    KERNEL_CONFIG_GZ, OS_RELEASE_FILE, PROC_MOUNTS_FILE, SYS_CLASS_BLOCK_DIR,
};
use hostns_core::{BlockDeviceInfo, DiskStat, Error, Result};
use nix::sys::statfs::{self, FsType};
use nix::sys::statvfs::statvfs;
use nix::sys::utsname::uname;
use tracing::{debug, warn};

const KERNEL_CONFIG_PREFIX: &str = "CONFIG_";

const FS_TYPE_NAMES: &[(FsType, &str)] = &[
    (statfs::EXT4_SUPER_MAGIC, "ext4"),
    (statfs::XFS_SUPER_MAGIC, "xfs"),
    (statfs::BTRFS_SUPER_MAGIC, "btrfs"),
    (statfs::TMPFS_MAGIC, "tmpfs"),
    (statfs::OVERLAYFS_SUPER_MAGIC, "overlayfs"),
    (statfs::NFS_SUPER_MAGIC, "nfs"),
    (statfs::PROC_SUPER_MAGIC, "proc"),
];

/// Machine hardware name (e.g. `x86_64`)
pub fn get_arch() -> Result<String> {
    Ok(uname()?.machine().to_string_lossy().into_owned())
}

/// Release of the running kernel
pub fn get_kernel_release() -> Result<String> {
    Ok(uname()?.release().to_string_lossy().into_owned())
}

/// Extract the `ID` field from os-release content
pub fn parse_os_distro(content: &str) -> Result<String> {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix("ID="))
        .map(|value| value.trim().trim_matches('"').to_string())
        .ok_or_else(|| Error::Parse {
            message: "failed to find ID field in os-release content".to_string(),
        })
}

/// Distribution ID read from an os-release file
pub fn read_os_distro(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
    parse_os_distro(&content)
}

/// Distribution ID of the current mount namespace
pub fn get_os_distro() -> Result<String> {
    read_os_distro(Path::new(OS_RELEASE_FILE))
}

/// Block devices listed under `/sys/class/block`
pub fn system_block_devices() -> Result<HashMap<String, BlockDeviceInfo>> {
    system_block_devices_in(Path::new(SYS_CLASS_BLOCK_DIR))
}

/// Block devices listed under `dir`, keyed by name
///
/// Each entry is expected to hold a `dev` file containing `major:minor`.
/// Entries whose `dev` file is missing or malformed are skipped.
pub fn system_block_devices_in(dir: &Path) -> Result<HashMap<String, BlockDeviceInfo>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io_at(dir, e))?;

    let mut devices = HashMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io_at(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let dev_path = entry.path().join("dev");

        let content = match fs::read_to_string(&dev_path) {
            Ok(content) => content,
            Err(e) => {
                debug!(device = %name, error = %e, "Skipping block device without dev file");
                continue;
            }
        };

        match parse_major_minor(&content) {
            Some((major, minor)) => {
                devices.insert(name.clone(), BlockDeviceInfo { name, major, minor });
            }
            None => {
                warn!(
                    device = %name,
                    content = content.trim(),
                    "Skipping block device with malformed dev file"
                );
            }
        }
    }

    Ok(devices)
}

fn parse_major_minor(content: &str) -> Option<(u32, u32)> {
    let (major, minor) = content.trim().split_once(':')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Filesystem statistics of the filesystem holding `path`
pub fn get_disk_stat(path: &Path) -> Result<DiskStat> {
    let vfs = statvfs(path).map_err(|e| Error::io_at(path, e.into()))?;
    let fs_stat = statfs::statfs(path).map_err(|e| Error::io_at(path, e.into()))?;

    let block_size = u64::from(vfs.fragment_size());
    let total_blocks = u64::from(vfs.blocks());
    let free_blocks = u64::from(vfs.blocks_free());

    Ok(DiskStat {
        disk_id: filesystem_id_hex(u64::from(vfs.filesystem_id())),
        path: path.to_path_buf(),
        fs_type: fs_type_name(fs_stat.filesystem_type()).to_string(),
        free_blocks,
        total_blocks,
        block_size,
        storage_maximum: total_blocks.saturating_mul(block_size),
        storage_available: free_blocks.saturating_mul(block_size),
    })
}

/// Render `f_fsid` the way `stat -f -c %i` does: `val[0]` first, unpadded hex
///
/// `statvfs` packs the pair as `val[0] | val[1] << 32`.
fn filesystem_id_hex(raw: u64) -> String {
    format!("{:x}", ((raw & 0xffff_ffff) << 32) | (raw >> 32))
}

fn fs_type_name(fs_type: FsType) -> &'static str {
    FS_TYPE_NAMES
        .iter()
        .find(|(magic, _)| *magic == fs_type)
        .map_or("unknown", |(_, name)| *name)
}

/// Flush filesystem buffers
pub fn sync() {
    nix::unistd::sync();
}

/// Kernel config from `<boot_dir>/config-<release>`
pub fn boot_kernel_config(boot_dir: &Path, release: &str) -> Result<HashMap<String, String>> {
    let path = boot_dir.join(format!("config-{release}"));
    let file = File::open(&path).map_err(|e| Error::io_at(&path, e))?;
    parse_kernel_config(BufReader::new(file), &path)
}

/// Kernel config from the gzip-compressed `<proc_dir>/config.gz`
pub fn proc_kernel_config(proc_dir: &Path) -> Result<HashMap<String, String>> {
    let path = proc_dir.join(KERNEL_CONFIG_GZ);
    let file = File::open(&path).map_err(|e| Error::io_at(&path, e))?;
    parse_kernel_config(BufReader::new(GzDecoder::new(file)), &path)
}

/// Parse `CONFIG_X=value` lines, skipping blanks and `#` comments
fn parse_kernel_config<R: BufRead>(reader: R, path: &Path) -> Result<HashMap<String, String>> {
    let mut config = HashMap::new();

    for line in reader.lines() {
        let line = line.map_err(|e| Error::io_at(path, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.split_once('=') {
            Some((key, value)) if key.starts_with(KERNEL_CONFIG_PREFIX) => {
                config.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(Error::Parse {
                    message: format!("invalid kernel config line in {}: {line}", path.display()),
                });
            }
        }
    }

    Ok(config)
}

/// Device mounted at `mount_path` according to `/proc/mounts`
pub fn find_block_device_for_mount(mount_path: &Path) -> Result<PathBuf> {
    find_block_device_for_mount_in(mount_path, Path::new(PROC_MOUNTS_FILE))
}

/// Device mounted at `mount_path` according to a mounts table
pub fn find_block_device_for_mount_in(mount_path: &Path, mounts_file: &Path) -> Result<PathBuf> {
    let content = fs::read_to_string(mounts_file).map_err(|e| Error::io_at(mounts_file, e))?;

    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            Some((fields.next()?, fields.next()?))
        })
        .find(|(_, target)| Path::new(target) == mount_path)
        .map(|(device, _)| PathBuf::from(device))
        .ok_or_else(|| Error::NotFound {
            kind: "mount",
            id: mount_path.display().to_string(),
        })
}

/// Physical disk behind a block device or partition
///
/// `/dev/sda2` resolves to `/dev/sda`, an NVMe namespace or partition to its
/// controller (`/dev/nvme0`).
pub fn resolve_block_device_to_physical_device(device: &Path) -> Result<PathBuf> {
    resolve_block_device_to_physical_device_with(device, |path: &Path| fs::canonicalize(path))
}

/// [`resolve_block_device_to_physical_device`] with a custom symlink resolver
pub fn resolve_block_device_to_physical_device_with<F>(
    device: &Path,
    canonicalize: F,
) -> Result<PathBuf>
where
    F: Fn(&Path) -> io::Result<PathBuf>,
{
    let resolved = canonicalize(device)
        .map_err(|e| Error::io_at(device, with_context(&e, "failed to resolve symlink")))?;

    let name = resolved.file_name().ok_or_else(|| Error::Parse {
        message: format!("block device path has no name: {}", resolved.display()),
    })?;

    let sysfs_path = Path::new(SYS_CLASS_BLOCK_DIR).join(name);
    let sysfs_resolved = canonicalize(&sysfs_path).map_err(|e| {
        Error::io_at(&sysfs_path, with_context(&e, "failed to resolve sysfs path"))
    })?;

    let components: Vec<&OsStr> = sysfs_resolved.iter().collect();
    let component_after = |marker: &str| {
        components
            .windows(2)
            .find(|pair| pair[0] == marker)
            .map(|pair| pair[1])
    };

    let physical = component_after("nvme")
        .or_else(|| component_after("block"))
        .or_else(|| components.last().copied())
        .ok_or_else(|| Error::Parse {
            message: format!("empty sysfs path for {}", device.display()),
        })?;

    debug!(
        device = %device.display(),
        sysfs = %sysfs_resolved.display(),
        "Resolved physical block device"
    );

    Ok(Path::new("/dev").join(physical))
}

fn with_context(err: &io::Error, context: &str) -> io::Error {
    io::Error::new(err.kind(), format!("{context}: {err}"))
}
