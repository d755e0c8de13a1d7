//! Info command implementation

use anyhow::{Context, Result};
use hostns_namespace::NamespaceExecutor;

pub async fn execute(executor: &NamespaceExecutor) -> Result<()> {
    let arch = executor
        .get_arch()
        .await
        .context("Failed to read architecture")?;
    let release = executor
        .get_kernel_release()
        .await
        .context("Failed to read kernel release")?;
    let distro = match executor.get_os_distro().await {
        Ok(distro) => distro,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read os-release");
            "unknown".to_string()
        }
    };

    println!("\n🖥️  Host Information");
    println!("{:-<60}", "");
    println!("Architecture:    {arch}");
    println!("Kernel Release:  {release}");
    println!("OS Distro:       {distro}");
    if let Some(dir) = executor.namespace_directory() {
        println!("Namespaces:      {}", dir.display());
    }
    println!("{:-<60}", "");

    Ok(())
}
