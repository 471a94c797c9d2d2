//! Server process liveness
//!
//! Local check against /proc, deliberately independent of the network
//! stack: a wedged server that still owns its socket fails here first.

use super::CheckOutcome;
use crate::plan::CheckKind;
use common::process::{processes_by_name, ProcessInfo, SERVER_PROCESS};

pub fn check() -> CheckOutcome {
    verdict(processes_by_name(SERVER_PROCESS))
}

fn verdict(found: Vec<ProcessInfo>) -> CheckOutcome {
    let name = CheckKind::ProcessLiveness.name();

    let live: Vec<&ProcessInfo> = found.iter().filter(|p| !p.state.is_zombie()).collect();
    if live.is_empty() {
        return CheckOutcome::fail(name, format!("no running {} process", SERVER_PROCESS));
    }

    let hung: Vec<i32> = live
        .iter()
        .filter(|p| p.state.is_uninterruptible())
        .map(|p| p.pid)
        .collect();
    if !hung.is_empty() {
        return CheckOutcome::fail(
            name,
            format!(
                "{} pid(s) {:?} stuck in uninterruptible sleep",
                SERVER_PROCESS, hung
            ),
        );
    }

    let pids: Vec<i32> = live.iter().map(|p| p.pid).collect();
    CheckOutcome::pass(name, format!("{} running (pid {:?})", SERVER_PROCESS, pids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::process::ProcessState;

    fn info(pid: i32, state: ProcessState) -> ProcessInfo {
        ProcessInfo { pid, state }
    }

    #[test]
    fn no_process_fails() {
        let outcome = verdict(Vec::new());
        assert!(!outcome.passed);
        assert!(outcome.detail.contains("no running mongod"));
    }

    #[test]
    fn zombie_only_fails() {
        let outcome = verdict(vec![info(42, ProcessState::Zombie)]);
        assert!(!outcome.passed);
    }

    #[test]
    fn uninterruptible_sleep_fails() {
        let outcome = verdict(vec![
            info(42, ProcessState::Sleeping),
            info(43, ProcessState::UninterruptibleSleep),
        ]);
        assert!(!outcome.passed);
        assert!(outcome.detail.contains("43"));
    }

    #[test]
    fn sleeping_process_passes() {
        let outcome = verdict(vec![info(42, ProcessState::Sleeping)]);
        assert!(outcome.passed);
        assert!(outcome.detail.contains("42"));
    }

    #[test]
    fn zombie_next_to_live_process_passes() {
        let outcome = verdict(vec![
            info(41, ProcessState::Zombie),
            info(42, ProcessState::Running),
        ]);
        assert!(outcome.passed);
    }
}
