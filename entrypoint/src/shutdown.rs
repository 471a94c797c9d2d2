//! Termination signals and graceful server shutdown
//!
//! The entrypoint runs as PID 1, so signals the runtime sends at pod
//! termination land here and must be translated into an orderly database
//! shutdown: ask the server to stop, wait a bounded time, then escalate.

use anyhow::Result;
use common::command::mongosh_eval;
use common::process::{live_processes_by_name, SERVER_PROCESS};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::process::Child;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

/// Seconds the server itself gets to drain active operations.
const CLEAN_SHUTDOWN_TIMEOUT_SECS: u32 = 10;
/// Wall-clock bound on the shell call itself; a wedged server must not
/// stall the ladder before the SIGTERM rung.
const CLEAN_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(15);
/// One-second polls before escalating to SIGKILL.
const SHUTDOWN_POLL_ITERATIONS: u32 = 30;

/// Listener for the termination signals a container runtime delivers.
///
/// Install once at startup so signals arriving during the setup pipeline
/// are buffered rather than killing the process outright. Every blocking
/// wait in the pipeline selects over `recv`.
pub struct Shutdown {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
}

impl Shutdown {
    pub fn install() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sigquit: signal(SignalKind::quit())?,
        })
    }

    /// Wait for the next termination signal.
    pub async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.sigterm.recv() => Signal::SIGTERM,
            _ = self.sigint.recv() => Signal::SIGINT,
            _ = self.sigquit.recv() => Signal::SIGQUIT,
        }
    }
}

/// Stop the database server, escalating as needed.
///
/// Ladder: clean `shutdownServer` through the admin shell, SIGTERM on
/// refusal, a bounded poll for the process to disappear, SIGKILL for
/// whatever is left. Never fails; the caller exits 0 afterwards so the
/// runtime records an orderly stop.
pub async fn graceful_shutdown(port: u16, mut child: Option<&mut Child>) {
    let running = live_processes_by_name(SERVER_PROCESS);
    if running.is_empty() {
        info!("No {} process running, nothing to shut down", SERVER_PROCESS);
        return;
    }

    let pids: Vec<i32> = running.iter().map(|p| p.pid).collect();
    info!(pids = ?pids, "Shutting down server");

    let eval = format!(
        "db.getSiblingDB('admin').shutdownServer({{force: false, timeoutSecs: {}}})",
        CLEAN_SHUTDOWN_TIMEOUT_SECS
    );
    match timeout(CLEAN_SHUTDOWN_DEADLINE, mongosh_eval("localhost", port, &eval)).await {
        // The shell often reports the connection dropping as the server
        // goes down; the poll below settles what actually happened.
        Ok(Ok(_)) => info!("Clean shutdown command accepted"),
        Ok(Err(e)) => {
            warn!(error = %e, "Clean shutdown not confirmed, sending SIGTERM");
            for pid in &pids {
                let _ = kill(Pid::from_raw(*pid), Signal::SIGTERM);
            }
        }
        Err(_) => {
            warn!(
                deadline_secs = CLEAN_SHUTDOWN_DEADLINE.as_secs(),
                "Clean shutdown attempt timed out, sending SIGTERM"
            );
            for pid in &pids {
                let _ = kill(Pid::from_raw(*pid), Signal::SIGTERM);
            }
        }
    }

    for _ in 0..SHUTDOWN_POLL_ITERATIONS {
        // Reap our own child if that is what died, otherwise it lingers
        // as a zombie and never leaves the scan.
        if let Some(c) = child.as_deref_mut() {
            let _ = c.try_wait();
        }
        if live_processes_by_name(SERVER_PROCESS).is_empty() {
            info!("Server stopped");
            return;
        }
        sleep(Duration::from_secs(1)).await;
    }

    warn!(
        waited_secs = SHUTDOWN_POLL_ITERATIONS,
        "Server still running, escalating to SIGKILL"
    );
    for p in live_processes_by_name(SERVER_PROCESS) {
        let _ = kill(Pid::from_raw(p.pid), Signal::SIGKILL);
    }
    if let Some(c) = child {
        let _ = c.wait().await;
    }
}
