//! Host namespace demonstration
//!
//! Run with: cargo run --example host_demo
//! Run as root inside a container with the host /proc mounted at /host/proc:
//! sudo cargo run --example host_demo

use std::path::Path;
use std::time::Duration;

use hostns_core::ProcessId;
use hostns_core::constants::{HOST_PROC_DIR, PROC_DIR};
use hostns_namespace::{
    NamespaceConfig, NamespaceExecutor, NamespaceJoinerFactory, ProcessLocator,
    default_process_name,
};

#[tokio::main]
async fn main() {
    println!("🔒 hostns Demo\n");

    tracing_subscriber::fmt::init();

    demo_current_namespaces();
    demo_config_options();
    demo_host_queries().await;
}

fn demo_current_namespaces() {
    println!("📊 Current Process Namespaces:");
    println!("{:-<60}", "");

    let locator = ProcessLocator::new(PROC_DIR);
    match locator.namespace_info(ProcessId::current()) {
        Ok(info) => print!("{info}"),
        Err(e) => println!("❌ Failed to get namespaces: {e}"),
    }
    println!();
}

fn demo_config_options() {
    println!("⚙️  Configuration Options:\n");

    let configs = [
        ("Default", NamespaceConfig::new()),
        ("Host", NamespaceConfig::host()),
        ("None", NamespaceConfig::none()),
        (
            "Custom",
            NamespaceConfig::none()
                .with_mount(true)
                .with_uts(true)
                .with_process_name("kubelet"),
        ),
    ];

    for (name, config) in &configs {
        let enabled: Vec<_> = config
            .enabled_namespaces()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("  {name:<8} {} ({})", enabled.join(", "), config.process_name);
    }
    println!();
}

async fn demo_host_queries() {
    println!("🖥️  Host Queries:");
    println!("{:-<60}", "");

    let process = default_process_name(&NamespaceJoinerFactory, Path::new(HOST_PROC_DIR)).await;
    println!("Target process: {process}");

    let config = NamespaceConfig::host()
        .with_process_name(&process)
        .with_join_timeout(Duration::from_secs(10));

    let executor = match NamespaceExecutor::new(config) {
        Ok(executor) => executor,
        Err(e) => {
            println!("❌ Failed to target host namespaces: {e}");
            return;
        }
    };

    match executor.get_kernel_release().await {
        Ok(release) => println!("Kernel release: {release}"),
        Err(e) => println!("❌ Kernel release: {e}"),
    }

    match executor.get_disk_stat("/").await {
        Ok(stat) => println!(
            "Root filesystem: {} ({} of {} bytes free)",
            stat.fs_type, stat.storage_available, stat.storage_maximum
        ),
        Err(e) => println!("❌ Disk stat: {e}"),
    }

    match executor
        .execute(&[], "uname", &["-a".to_string()], Duration::from_secs(5))
        .await
    {
        Ok(output) => print!("uname: {output}"),
        Err(e) => println!("❌ uname: {e}"),
    }
}
