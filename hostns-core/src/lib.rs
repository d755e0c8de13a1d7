//! Hostns Core - Foundation types and errors
//!
//! This crate provides the types shared by every hostns crate: the error
//! enum, the namespace kinds that can be joined, and the records returned by
//! host introspection.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{BlockDeviceInfo, DiskStat, FileInfo, Namespace, ProcessId};
