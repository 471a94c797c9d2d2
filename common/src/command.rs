//! Command execution utilities
//!
//! Provides consistent command execution with proper error handling and logging.

use anyhow::{anyhow, Context, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Result of a command execution.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// Run a command and return its output.
///
/// This is a low-level function that returns both stdout and stderr.
/// Use `run_checked` if you want to treat non-zero exit as an error.
/// Callers may timebox with `tokio::time::timeout`; dropping the future
/// kills the spawned process instead of orphaning it.
#[instrument(skip_all, fields(cmd = %cmd))]
pub async fn run(cmd: &str, args: &[&str]) -> Result<CommandOutput> {
    debug!(args = ?args, "Running command");

    let output = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .context(format!("Failed to execute {}", cmd))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        success: output.status.success(),
        code: output.status.code(),
    })
}

/// Run a command and return stdout if successful, error otherwise.
///
/// # Example
/// ```ignore
/// let version = run_checked("mongod", &["--version"]).await?;
/// ```
pub async fn run_checked(cmd: &str, args: &[&str]) -> Result<String> {
    let output = run(cmd, args).await?;
    if output.success {
        Ok(output.stdout)
    } else {
        let code = output
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        Err(anyhow!("{} failed (exit {}): {}", cmd, code, output.stderr))
    }
}

/// Evaluate a JavaScript expression against a server with the admin shell.
///
/// Runs with `--quiet` and `--norc`, so stdout carries only what the
/// expression prints. Scripts that need a parseable reply should
/// `print(JSON.stringify(...))` their result.
///
/// # Example
/// ```ignore
/// let reply = mongosh_eval("localhost", 27017, "print(JSON.stringify(db.adminCommand({ping: 1})))").await?;
/// ```
pub async fn mongosh_eval(host: &str, port: u16, eval: &str) -> Result<String> {
    let port = port.to_string();
    run_checked(
        "mongosh",
        &[
            "--host",
            host,
            "--port",
            port.as_str(),
            "--quiet",
            "--norc",
            "--eval",
            eval,
        ],
    )
    .await
}
