//! Disk-stat command implementation

use std::path::Path;

use anyhow::{Context, Result};
use hostns_namespace::NamespaceExecutor;

pub async fn execute(executor: &NamespaceExecutor, path: &Path, json: bool) -> Result<()> {
    let stat = executor
        .get_disk_stat(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stat)?);
        return Ok(());
    }

    println!("\n💾 Disk Stat for {}", stat.path.display());
    println!("{:-<60}", "");
    println!("Disk ID:         {}", stat.disk_id);
    println!("Filesystem:      {}", stat.fs_type);
    println!("Block Size:      {}", stat.block_size);
    println!("Total Blocks:    {}", stat.total_blocks);
    println!("Free Blocks:     {}", stat.free_blocks);
    println!("Capacity:        {} bytes", stat.storage_maximum);
    println!("Available:       {} bytes", stat.storage_available);
    println!("{:-<60}", "");

    Ok(())
}
