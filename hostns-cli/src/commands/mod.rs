use std::time::Duration;

use anyhow::{Context, Result};
use hostns_namespace::{
    NamespaceConfig, NamespaceExecutor, NamespaceJoinerFactory, default_process_name,
};

use crate::cli::{Cli, Commands};

pub mod block_devices;
pub mod disk_stat;
pub mod exec;
pub mod info;
pub mod lock;
pub mod luks;
pub mod namespaces;

/// Dispatch command to appropriate handler
pub async fn dispatch(cli: Cli) -> Result<()> {
    if let Commands::Namespaces { pid } = cli.command {
        return namespaces::execute(&cli.proc_dir, pid);
    }

    let executor = build_executor(&cli).await?;

    match cli.command {
        Commands::Exec {
            env,
            timeout,
            command,
        } => exec::execute(&executor, &env, secs(timeout), &command).await,

        Commands::Info => info::execute(&executor).await,

        Commands::DiskStat { path, json } => disk_stat::execute(&executor, &path, json).await,

        Commands::BlockDevices { json } => block_devices::execute(&executor, json).await,

        Commands::Lock {
            path,
            timeout,
            command,
        } => lock::execute(&executor, &path, secs(timeout), &command).await,

        Commands::LuksStatus { volume } => luks::execute(&executor, &volume).await,

        Commands::Namespaces { .. } => Ok(()),
    }
}

/// Map the global flags onto an executor
async fn build_executor(cli: &Cli) -> Result<NamespaceExecutor> {
    if cli.current {
        tracing::debug!("Running in current namespaces");
        return Ok(NamespaceExecutor::current());
    }

    let process_name = match &cli.process {
        Some(name) => name.clone(),
        None => default_process_name(&NamespaceJoinerFactory, &cli.proc_dir).await,
    };

    let config = NamespaceConfig::none()
        .with_namespaces(&cli.namespaces)
        .with_process_name(&process_name)
        .with_proc_dir(&cli.proc_dir)
        .with_join_timeout(secs(cli.join_timeout));

    NamespaceExecutor::new(config)
        .with_context(|| format!("Failed to target namespaces of process '{process_name}'"))
}

const fn secs(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}
