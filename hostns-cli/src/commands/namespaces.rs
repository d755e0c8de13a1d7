//! Namespaces command implementation

use std::path::Path;

use anyhow::{Context, Result};
use hostns_core::ProcessId;
use hostns_core::constants::PROC_DIR;
use hostns_namespace::ProcessLocator;

pub fn execute(host_proc_dir: &Path, pid: Option<i32>) -> Result<()> {
    let target_pid = pid.map_or_else(ProcessId::current, ProcessId::from_raw);

    println!("\n🔒 Namespace Information for PID {target_pid}");
    println!("{:-<60}", "");

    let ns_info = ProcessLocator::new(PROC_DIR)
        .namespace_info(target_pid)
        .context("Failed to get namespace information")?;

    print!("{ns_info}");

    let host = ProcessLocator::new(host_proc_dir);
    match host.namespace_info(host.host_root_pid()) {
        Ok(root) => {
            let differing = ns_info.differs_from(&root);
            if differing.is_empty() {
                println!("\n⚠️  Process is in host namespaces");
            } else {
                let names: Vec<_> = differing.iter().map(ToString::to_string).collect();
                println!("\n✅ Isolated from host in: {}", names.join(", "));
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Host namespaces not readable");
            println!("\nHost namespaces not readable under {}", host_proc_dir.display());
        }
    }

    Ok(())
}
