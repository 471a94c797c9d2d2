//! MongoDB container entrypoint
//!
//! Runs as PID 1: prepares the volume directories, waits for the listen
//! port, materializes mongod.conf, stages first-run credentials, drops
//! privileges, and supervises the server until it exits or the pod is
//! terminated. Non-database commands are executed directly instead.

mod conf;
mod config;
mod credentials;
mod dirs;
mod launch;
mod port;
mod shutdown;

use anyhow::{Context, Result};
use common::{init_logging, K8sEnv};
use config::RuntimeConfig;
use launch::LaunchIntent;
use shutdown::Shutdown;
use std::env;
use std::path::Path;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging("mongodb-entrypoint");

    let config = RuntimeConfig::from_env();
    let intent = LaunchIntent::from_args(env::args().skip(1));

    // Install before any blocking step so early signals are buffered,
    // not dropped.
    let mut shutdown = Shutdown::install().context("Failed to install signal handlers")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = %intent.command,
        "=== MongoDB entrypoint ==="
    );
    if K8sEnv::is_kubernetes() {
        info!(
            namespace = %K8sEnv::namespace(),
            pod = %K8sEnv::pod_name(),
            service = %K8sEnv::service_name(),
            "Kubernetes environment detected"
        );
    }

    if !intent.is_database_command {
        return launch::passthrough(&config, intent, &mut shutdown).await;
    }

    let prepared = dirs::prepare(&config).await?;
    let created = prepared.iter().filter(|d| d.created).count();
    let degraded: Vec<&str> = prepared
        .iter()
        .filter(|d| d.degraded)
        .map(|d| d.path.as_str())
        .collect();
    if degraded.is_empty() {
        info!(dirs = prepared.len(), created, "Directories ready");
    } else {
        warn!(
            dirs = prepared.len(),
            created,
            degraded = ?degraded,
            "Directories ready, ownership or mode degraded"
        );
    }

    port::wait_until_free(&config, &mut shutdown).await;
    let config_file = conf::materialize(&config).await?;
    let staged = credentials::stage_for_bootstrap(&config.data_dir)?;

    let config_flag = Path::new(&config_file)
        .exists()
        .then_some(config_file.as_str());
    let args = launch::assemble_args(&intent, &config, config_flag);
    let args = launch::with_numa_policy(args).await;

    launch::run_server(&config, args, staged, &mut shutdown).await
}
