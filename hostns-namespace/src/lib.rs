//! Running host operations inside the namespaces of a host process
//!
//! An agent running in a container reaches the host by joining the mount,
//! network and IPC namespaces of a host process (pid 1 by default):
//! - [`ProcessLocator`] - finds the target process and its `ns` directory
//! - [`Joiner`] - switches a dedicated thread into those namespaces and runs work
//! - [`NamespaceExecutor`] - commands, LUKS, disk and device queries on the host
//! - [`FileLock`] - advisory locks on host files

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod config;
pub mod crypto;
pub mod executor;
pub mod fake;
pub mod filelock;
pub mod joiner;
pub mod proc;

pub use config::NamespaceConfig;
pub use executor::NamespaceExecutor;
pub use filelock::FileLock;
pub use joiner::{Join, JoinOutput, Joiner, JoinerFactory, NamespaceJoinerFactory, Work};
pub use proc::{NamespaceInfo, ProcessDescriptor, ProcessLocator, default_process_name};
