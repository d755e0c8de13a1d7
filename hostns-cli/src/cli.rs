//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hostns_core::Namespace;
use hostns_core::constants::HOST_PROC_DIR;

#[derive(Parser)]
#[command(name = "hostns")]
#[command(about = "Run commands in the namespaces of a host process", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging (`RUST_LOG` takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Proc directory of the host
    #[arg(long, global = true, default_value = HOST_PROC_DIR)]
    pub proc_dir: PathBuf,

    /// Target process name (detected from the host OS when omitted)
    #[arg(long, global = true)]
    pub process: Option<String>,

    /// Namespaces to join, comma separated
    #[arg(
        long,
        global = true,
        value_delimiter = ',',
        default_value = "ipc,mnt,net"
    )]
    pub namespaces: Vec<Namespace>,

    /// Stay in the current namespaces
    #[arg(long, global = true)]
    pub current: bool,

    /// Join timeout in seconds, 0 waits forever
    #[arg(long, global = true, default_value_t = 0)]
    pub join_timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a binary on the host
    Exec {
        /// Environment assignment (KEY=VALUE), repeatable
        #[arg(short, long)]
        env: Vec<String>,

        /// Command timeout in seconds, 0 disables it
        #[arg(long, default_value_t = 60)]
        timeout: u64,

        /// Command to run
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Show host architecture, kernel release and distro
    Info,

    /// Show filesystem statistics of a host path
    DiskStat {
        /// Path to query
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List host block devices
    BlockDevices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show namespace links of a process
    Namespaces {
        /// Process ID (default: current process)
        #[arg(short, long)]
        pid: Option<i32>,
    },

    /// Hold an exclusive lock on a host file while running a command
    Lock {
        /// File to lock
        path: PathBuf,

        /// Lock timeout in seconds, 0 waits forever
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Command to run while the lock is held
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Show the status of a LUKS mapped volume
    LuksStatus {
        /// Mapped volume name
        volume: String,
    },
}
