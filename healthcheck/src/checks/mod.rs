//! Probe checks and verdict aggregation

mod disk;
mod process;
mod server;

use crate::config::Config;
use crate::plan::{CheckKind, Plan};
use tracing::{info, warn};

/// Result of one check, always produced even on failure.
#[derive(Debug)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    pub fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            detail: detail.into(),
        }
    }
}

async fn run_check(kind: CheckKind, config: &Config, plan: &Plan) -> CheckOutcome {
    match kind {
        CheckKind::ProcessLiveness => process::check(),
        CheckKind::Connectivity => server::check_connectivity(config, &plan.policy).await,
        CheckKind::ServerStatus => server::check_server_status(config, &plan.policy).await,
        CheckKind::ReadWrite => server::check_read_write(config, &plan.policy).await,
        CheckKind::ReplicaSet => server::check_replica_set(config, &plan.policy).await,
        CheckKind::DiskCapacity => disk::check(config),
    }
}

/// Run every check in the plan, in order.
///
/// A failing check never short-circuits the rest; a single run logs
/// every failure it finds.
pub async fn run_plan(plan: &Plan, config: &Config) -> Vec<CheckOutcome> {
    let mut outcomes = Vec::with_capacity(plan.checks.len());
    for kind in plan.checks {
        let outcome = run_check(*kind, config, plan).await;
        if outcome.passed {
            info!(check = outcome.name, "{}", outcome.detail);
        } else {
            warn!(check = outcome.name, "{}", outcome.detail);
        }
        outcomes.push(outcome);
    }
    outcomes
}

/// The probe verdict is the conjunction of every scheduled check.
pub fn all_passed(outcomes: &[CheckOutcome]) -> bool {
    outcomes.iter().all(|o| o.passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::plan::Mode;
    use std::time::Duration;

    #[tokio::test]
    async fn full_plan_runs_every_check_despite_failures() {
        // No server is listening here; remote checks fail fast under a
        // tiny budget but every check must still report an outcome.
        let mut config = test_config();
        config.port = 1;
        config.timeout = Duration::from_millis(250);
        config.retries = 1;

        let plan = Plan::for_mode(Mode::Readiness, &config);
        let outcomes = run_plan(&plan, &config).await;

        assert_eq!(outcomes.len(), plan.checks.len());
        for (outcome, kind) in outcomes.iter().zip(plan.checks) {
            assert_eq!(outcome.name, kind.name());
        }
    }

    #[test]
    fn verdict_is_a_conjunction() {
        let outcomes = vec![
            CheckOutcome::pass("a", "ok"),
            CheckOutcome::pass("b", "ok"),
        ];
        assert!(all_passed(&outcomes));

        let outcomes = vec![
            CheckOutcome::pass("a", "ok"),
            CheckOutcome::fail("b", "broken"),
            CheckOutcome::pass("c", "ok"),
        ];
        assert!(!all_passed(&outcomes));
    }

    #[test]
    fn empty_plan_passes() {
        assert!(all_passed(&[]));
    }
}
