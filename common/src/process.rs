//! Process discovery via the /proc filesystem
//!
//! The entrypoint and the health probe both need to find the database
//! server by name: the probe to judge liveness, the entrypoint to target
//! signals during shutdown. Matching is by exact `comm` name.

use std::fs;

/// Name the database server process is discoverable by.
pub const SERVER_PROCESS: &str = "mongod";

/// Scheduler state of a process, from the state field of /proc/<pid>/stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Sleeping,
    /// Uninterruptible sleep, usually stuck on I/O.
    UninterruptibleSleep,
    /// Exited but not yet reaped by its parent.
    Zombie,
    Stopped,
    Other(char),
}

impl ProcessState {
    fn from_code(code: char) -> Self {
        match code {
            'R' => ProcessState::Running,
            'S' | 'I' => ProcessState::Sleeping,
            'D' => ProcessState::UninterruptibleSleep,
            'Z' => ProcessState::Zombie,
            'T' | 't' => ProcessState::Stopped,
            other => ProcessState::Other(other),
        }
    }

    pub fn is_zombie(self) -> bool {
        self == ProcessState::Zombie
    }

    pub fn is_uninterruptible(self) -> bool {
        self == ProcessState::UninterruptibleSleep
    }
}

/// A process found by name.
#[derive(Debug, Clone, Copy)]
pub struct ProcessInfo {
    pub pid: i32,
    pub state: ProcessState,
}

/// Find all processes whose comm equals `name`.
///
/// Races with processes exiting mid-scan are expected; unreadable
/// entries are skipped.
pub fn processes_by_name(name: &str) -> Vec<ProcessInfo> {
    let entries = match fs::read_dir("/proc") {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let pid = match entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) {
            Some(pid) => pid,
            None => continue,
        };
        let comm = match fs::read_to_string(format!("/proc/{}/comm", pid)) {
            Ok(comm) => comm,
            Err(_) => continue,
        };
        if comm.trim_end() != name {
            continue;
        }
        let state = read_state(pid).unwrap_or(ProcessState::Other('?'));
        found.push(ProcessInfo { pid, state });
    }
    found
}

/// Find matching processes that are still running (zombies excluded).
///
/// A freshly exited child lingers in /proc as a zombie until its parent
/// reaps it, so a raw name scan would keep "seeing" it.
pub fn live_processes_by_name(name: &str) -> Vec<ProcessInfo> {
    processes_by_name(name)
        .into_iter()
        .filter(|p| !p.state.is_zombie())
        .collect()
}

fn read_state(pid: i32) -> Option<ProcessState> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    parse_stat_state(&stat).map(ProcessState::from_code)
}

/// Extract the state character from a /proc/<pid>/stat line.
///
/// The state is the first field after the parenthesized comm; the comm
/// itself may contain spaces and parentheses, so split at the last ')'.
fn parse_stat_state(stat: &str) -> Option<char> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.split_whitespace().next()?.chars().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_state_from_stat_line() {
        let stat = "1234 (mongod) S 1 1234 1234 0 -1 4194560 1000 0 0 0";
        assert_eq!(parse_stat_state(stat), Some('S'));
    }

    #[test]
    fn parses_state_with_hostile_comm() {
        // comm may embed spaces and parentheses
        let stat = "77 (tricky) name (2)) Z 1 77 77 0 -1";
        assert_eq!(parse_stat_state(stat), Some('Z'));
    }

    #[test]
    fn parses_own_stat_entry() {
        let stat = fs::read_to_string("/proc/self/stat").unwrap();
        let state = parse_stat_state(&stat).map(ProcessState::from_code).unwrap();
        assert!(!state.is_zombie());
    }

    #[test]
    fn state_classification() {
        assert!(ProcessState::from_code('Z').is_zombie());
        assert!(ProcessState::from_code('D').is_uninterruptible());
        assert!(!ProcessState::from_code('R').is_zombie());
        assert_eq!(ProcessState::from_code('W'), ProcessState::Other('W'));
    }

    #[test]
    fn scan_skips_missing_names() {
        assert!(processes_by_name("no-such-process-name").is_empty());
    }
}
