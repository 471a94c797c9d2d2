//! Probe plans: which checks run for which invocation mode

use crate::config::Config;
use std::fmt;
use std::time::Duration;

/// Startup probes cover initial sync and journal replay, which take
/// far longer than a steady-state probe should wait.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const STARTUP_RETRIES: u32 = 10;

/// Kubernetes probe the invocation maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Liveness,
    Readiness,
    Startup,
}

impl Mode {
    /// Map the first CLI argument to a mode.
    ///
    /// Unknown or missing arguments run the full readiness suite, the
    /// strictest interpretation.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(|a| a.to_ascii_lowercase()).as_deref() {
            Some("liveness") | Some("live") => Mode::Liveness,
            Some("startup") => Mode::Startup,
            _ => Mode::Readiness,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Liveness => "liveness",
            Mode::Readiness => "readiness",
            Mode::Startup => "startup",
        };
        f.write_str(name)
    }
}

/// The individual checks a plan can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    ProcessLiveness,
    Connectivity,
    ServerStatus,
    ReadWrite,
    ReplicaSet,
    DiskCapacity,
}

impl CheckKind {
    pub fn name(self) -> &'static str {
        match self {
            CheckKind::ProcessLiveness => "process-liveness",
            CheckKind::Connectivity => "connectivity",
            CheckKind::ServerStatus => "server-status",
            CheckKind::ReadWrite => "read-write",
            CheckKind::ReplicaSet => "replica-set",
            CheckKind::DiskCapacity => "disk-capacity",
        }
    }
}

/// Liveness and startup only establish "the server is alive".
const BASIC_CHECKS: [CheckKind; 2] = [CheckKind::ProcessLiveness, CheckKind::Connectivity];

/// Readiness establishes "the server can do useful work".
const FULL_CHECKS: [CheckKind; 6] = [
    CheckKind::ProcessLiveness,
    CheckKind::Connectivity,
    CheckKind::ServerStatus,
    CheckKind::ReadWrite,
    CheckKind::ReplicaSet,
    CheckKind::DiskCapacity,
];

/// Timeout and retry budget applied to the remote checks.
#[derive(Debug, Clone, Copy)]
pub struct ProbePolicy {
    pub timeout: Duration,
    pub retries: u32,
}

/// Everything one probe invocation will do.
#[derive(Debug)]
pub struct Plan {
    pub mode: Mode,
    pub checks: &'static [CheckKind],
    pub policy: ProbePolicy,
}

impl Plan {
    pub fn for_mode(mode: Mode, config: &Config) -> Self {
        let policy = match mode {
            // Startup gets the stretched budget regardless of the env
            // knobs; they tune steady-state probes only.
            Mode::Startup => ProbePolicy {
                timeout: STARTUP_TIMEOUT,
                retries: STARTUP_RETRIES,
            },
            _ => ProbePolicy {
                timeout: config.timeout,
                retries: config.retries,
            },
        };
        let checks: &'static [CheckKind] = match mode {
            Mode::Liveness | Mode::Startup => &BASIC_CHECKS,
            Mode::Readiness => &FULL_CHECKS,
        };
        Self {
            mode,
            checks,
            policy,
        }
    }
}
