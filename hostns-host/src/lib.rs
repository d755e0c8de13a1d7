//! Host primitives that act on the namespaces of the calling thread
//!
//! This crate knows nothing about joining namespaces. It provides the plain
//! operations (command execution, sysfs/procfs queries, file helpers) that
//! `hostns-namespace` runs inside a joined worker thread.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod exec;
pub mod fs;
pub mod sys;

pub use exec::{CommandExecutor, ExecCall, Executor, MockExecutor};

// Re-export commonly used types
pub use hostns_core::{BlockDeviceInfo, DiskStat, Error, FileInfo, Result};
