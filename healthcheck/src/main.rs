//! Kubernetes health probe for the MongoDB container
//!
//! Invoked by the kubelet as `mongodb-healthcheck <mode>`. Exit code 0
//! means every check in the mode's plan passed; anything else means the
//! probe failed. Diagnostics go to stderr only.

mod checks;
mod config;
mod plan;

use common::init_logging;
use config::Config;
use plan::{Mode, Plan};
use std::env;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _guard = init_logging("mongodb-healthcheck");

    let config = Config::from_env();
    let mode = Mode::from_arg(env::args().nth(1).as_deref());
    let plan = Plan::for_mode(mode, &config);
    let names: Vec<&str> = plan.checks.iter().map(|c| c.name()).collect();

    info!(
        mode = %plan.mode,
        checks = ?names,
        timeout_secs = plan.policy.timeout.as_secs(),
        retries = plan.policy.retries,
        server = %format!("{}:{}", config.host, config.port),
        "=== MongoDB health probe ==="
    );

    let outcomes = checks::run_plan(&plan, &config).await;

    if checks::all_passed(&outcomes) {
        info!(checks = outcomes.len(), "All checks passed");
    } else {
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.name)
            .collect();
        error!(failed = ?failed, "Health check failed");
        std::process::exit(1);
    }
}
