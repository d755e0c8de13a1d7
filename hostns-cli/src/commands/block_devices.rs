//! Block-devices command implementation

use anyhow::{Context, Result};
use hostns_namespace::NamespaceExecutor;

pub async fn execute(executor: &NamespaceExecutor, json: bool) -> Result<()> {
    let devices = executor
        .get_system_block_devices()
        .await
        .context("Failed to list block devices")?;

    let mut devices: Vec<_> = devices.into_values().collect();
    devices.sort_by(|a, b| a.name.cmp(&b.name));

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    println!("\n📀 Block Devices");
    println!("{:-<60}", "");

    if devices.is_empty() {
        println!("No block devices found");
        return Ok(());
    }

    for device in &devices {
        println!("  {:<16} {}:{}", device.name, device.major, device.minor);
    }
    println!("{:-<60}", "");
    println!("Total: {} device(s)", devices.len());

    Ok(())
}
