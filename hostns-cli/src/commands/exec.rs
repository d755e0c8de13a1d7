//! Exec command implementation

use std::time::Duration;

use anyhow::{Context, Result};
use hostns_namespace::NamespaceExecutor;

pub async fn execute(
    executor: &NamespaceExecutor,
    envs: &[String],
    timeout: Duration,
    command: &[String],
) -> Result<()> {
    let Some((binary, args)) = command.split_first() else {
        anyhow::bail!("No command given");
    };

    tracing::info!(binary = %binary, "Executing on host");

    let output = executor
        .execute(envs, binary, args, timeout)
        .await
        .with_context(|| format!("Failed to execute '{}'", command.join(" ")))?;

    print!("{output}");
    Ok(())
}
