//! LUKS status command implementation

use anyhow::{Context, Result};
use hostns_core::constants::LUKS_TIMEOUT;
use hostns_namespace::NamespaceExecutor;

pub async fn execute(executor: &NamespaceExecutor, volume: &str) -> Result<()> {
    let status = executor
        .luks_status(volume, LUKS_TIMEOUT)
        .await
        .with_context(|| format!("Failed to get status of LUKS volume '{volume}'"))?;

    print!("{status}");
    Ok(())
}
