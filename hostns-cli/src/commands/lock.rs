//! Lock command implementation

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use hostns_core::constants::EXECUTE_NO_TIMEOUT;
use hostns_namespace::NamespaceExecutor;

pub async fn execute(
    executor: &NamespaceExecutor,
    path: &Path,
    timeout: Duration,
    command: &[String],
) -> Result<()> {
    let mut lock = executor.file_lock(path, timeout);
    lock.lock()
        .await
        .with_context(|| format!("Failed to lock {}", path.display()))?;

    println!("🔐 Locked {}", path.display());

    let result = match command.split_first() {
        Some((binary, args)) => executor
            .execute(&[], binary, args, EXECUTE_NO_TIMEOUT)
            .await
            .with_context(|| format!("Failed to execute '{}'", command.join(" ")))
            .map(|output| print!("{output}")),
        None => Ok(()),
    };

    lock.unlock()
        .with_context(|| format!("Failed to unlock {}", path.display()))?;
    println!("🔓 Unlocked {}", path.display());

    result
}
