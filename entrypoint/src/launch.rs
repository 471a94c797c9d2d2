//! Launch command classification, assembly, and supervision
//!
//! Decides what the container was asked to run, builds the final server
//! argument vector, drops privileges, and supervises the child until it
//! exits or a termination signal arrives.

use crate::config::RuntimeConfig;
use crate::credentials::StagedCredentials;
use crate::dirs;
use crate::shutdown::{graceful_shutdown, Shutdown};
use anyhow::{anyhow, Context, Result};
use common::command::run;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Binaries shipped with the server image that get the full pipeline.
const DATABASE_COMMANDS: [&str; 4] = ["mongod", "mongos", "mongo", "mongosh"];
const DEFAULT_COMMAND: &str = "mongod";

/// What the container arguments asked us to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchIntent {
    pub argv: Vec<String>,
    /// Resolved command name after defaulting and flag handling.
    pub command: String,
    /// Whether the full startup pipeline applies.
    pub is_database_command: bool,
}

impl LaunchIntent {
    /// Classify the container arguments.
    ///
    /// Empty argv launches the server with defaults. A leading flag
    /// means "server with these options". Anything else passes through
    /// untouched.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Self {
        let argv: Vec<String> = args.into_iter().collect();
        let command = match argv.first() {
            None => DEFAULT_COMMAND.to_string(),
            Some(first) if first.starts_with('-') => DEFAULT_COMMAND.to_string(),
            Some(first) => first.clone(),
        };
        let is_database_command = DATABASE_COMMANDS.contains(&command.as_str());
        Self {
            argv,
            command,
            is_database_command,
        }
    }
}

/// Build the final server argument vector.
///
/// Prepends the default command when argv was empty or started with a
/// flag, then appends the managed flags. User-provided argv order is
/// preserved ahead of ours.
pub fn assemble_args(
    intent: &LaunchIntent,
    config: &RuntimeConfig,
    config_file: Option<&str>,
) -> Vec<String> {
    let mut args: Vec<String> = if intent.argv.is_empty() {
        vec![DEFAULT_COMMAND.to_string()]
    } else if intent.argv[0].starts_with('-') {
        let mut v = Vec::with_capacity(intent.argv.len() + 1);
        v.push(DEFAULT_COMMAND.to_string());
        v.extend(intent.argv.iter().cloned());
        v
    } else {
        intent.argv.clone()
    };

    if let Some(path) = config_file {
        args.push("--config".to_string());
        args.push(path.to_string());
    }
    args.push("--bind_ip_all".to_string());
    args.push("--logpath".to_string());
    args.push(config.log_file());
    args.push("--logappend".to_string());
    args
}

/// Prepend an interleaved NUMA policy when the hardware has topology
/// worth interleaving. Absence of the numactl helper disables this
/// silently.
pub async fn with_numa_policy(args: Vec<String>) -> Vec<String> {
    match run("numactl", &["--hardware"]).await {
        Ok(out) if out.success => {
            info!("NUMA topology detected, interleaving memory allocation");
            prepend_numa(args)
        }
        _ => args,
    }
}

fn prepend_numa(args: Vec<String>) -> Vec<String> {
    let mut wrapped = Vec::with_capacity(args.len() + 2);
    wrapped.push("numactl".to_string());
    wrapped.push("--interleave=all".to_string());
    wrapped.extend(args);
    wrapped
}

fn with_privilege_drop(args: Vec<String>, owner: &str) -> Vec<String> {
    let mut wrapped = Vec::with_capacity(args.len() + 2);
    wrapped.push("gosu".to_string());
    wrapped.push(owner.to_string());
    wrapped.extend(args);
    wrapped
}

fn running_as_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

/// Exit status mapped the way a shell reports it: code when there is
/// one, 128+signal when the child was killed.
fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(1),
    }
}

fn spawn(args: &[String], creds: &StagedCredentials) -> Result<Child> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("Nothing to launch"))?;

    let mut cmd = Command::new(program);
    cmd.args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    for (var, value) in &creds.exports {
        cmd.env(var, value);
    }
    for var in &creds.scrubbed {
        cmd.env_remove(var);
    }

    cmd.spawn()
        .with_context(|| format!("Failed to start {}", program))
}

/// Launch the database server and supervise it.
///
/// Replaces an exec-style handoff: the child's exit code is propagated
/// through our own exit, and termination signals trigger the graceful
/// shutdown ladder instead of killing the supervisor first.
pub async fn run_server(
    config: &RuntimeConfig,
    args: Vec<String>,
    creds: StagedCredentials,
    shutdown: &mut Shutdown,
) -> Result<()> {
    let mut args = args;
    if running_as_root() {
        info!(owner = %config.owner(), user = %config.user, "Dropping privileges for server start");
        dirs::set_ownership(&config.data_dir, &config.owner()).await;
        dirs::set_ownership(&config.log_dir, &config.owner()).await;
        args = with_privilege_drop(args, &config.owner());
    } else {
        info!("Already running unprivileged");
    }

    let mut child = spawn(&args, &creds)?;
    let pid = child
        .id()
        .ok_or_else(|| anyhow!("Failed to get server PID"))?;
    info!(pid, bootstrap = creds.is_staged(), "Server started");

    tokio::select! {
        sig = shutdown.recv() => {
            info!(signal = %sig, "Received termination signal");
            graceful_shutdown(config.port, Some(&mut child)).await;
            std::process::exit(0);
        }
        status = child.wait() => {
            let status = status.context("Failed to wait on server process")?;
            let code = exit_code(status);
            if code == 0 {
                info!("Server exited cleanly");
            } else {
                warn!(code, "Server exited");
            }
            std::process::exit(code);
        }
    }
}

/// Run a non-database command, forwarding termination signals verbatim.
///
/// No setup pipeline and no shutdown ladder apply; the command owns its
/// own lifecycle and we mirror its exit code.
pub async fn passthrough(
    config: &RuntimeConfig,
    intent: LaunchIntent,
    shutdown: &mut Shutdown,
) -> Result<()> {
    info!(command = %intent.command, "Not a database command, executing directly");

    let mut args = intent.argv;
    if running_as_root() {
        args = with_privilege_drop(args, &config.owner());
    }

    let mut child = spawn(&args, &StagedCredentials::default())?;
    loop {
        tokio::select! {
            sig = shutdown.recv() => {
                info!(signal = %sig, "Forwarding signal to child");
                if let Some(pid) = child.id() {
                    let _ = kill(Pid::from_raw(pid as i32), sig);
                }
            }
            status = child.wait() => {
                let status = status.context("Failed to wait on child process")?;
                std::process::exit(exit_code(status));
            }
        }
    }
}
