//! Volume directory preparation
//!
//! Creates the data, log, config and scratch directories and adjusts
//! ownership and mode. Creation failure is fatal; ownership and mode
//! failures are logged and tolerated so read-only or pre-chowned mounts
//! still boot.

use crate::config::{RuntimeConfig, SCRATCH_DIR};
use anyhow::{Context, Result};
use common::command::run_checked;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Recursive chown can crawl a large data volume; bound it.
const CHOWN_TIMEOUT: Duration = Duration::from_secs(120);

/// Outcome of preparing a single directory.
///
/// `degraded` records tolerated ownership or mode failures so callers
/// and tests can distinguish a clean volume from a merely usable one.
#[derive(Debug)]
pub struct PreparedDir {
    pub path: String,
    pub created: bool,
    pub degraded: bool,
}

/// Prepare every directory the server needs, in a fixed order.
///
/// Safe to re-run on a restarted container; existing directories are
/// left in place and only re-chowned.
pub async fn prepare(config: &RuntimeConfig) -> Result<Vec<PreparedDir>> {
    let owner = config.owner();
    let mut prepared = Vec::new();
    for dir in [&config.data_dir, &config.log_dir, &config.config_dir] {
        prepared.push(prepare_one(dir, &owner, true).await?);
    }
    // Scratch space keeps group access but is not locked down further.
    prepared.push(prepare_one(SCRATCH_DIR, &owner, false).await?);
    Ok(prepared)
}

async fn prepare_one(dir: &str, owner: &str, strip_others: bool) -> Result<PreparedDir> {
    let created = !Path::new(dir).exists();
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir))?;
    if created {
        info!(dir, "Created directory");
    }

    let mut degraded = !set_ownership(dir, owner).await;

    let mode = if strip_others { "g+rwx,o-rwx" } else { "g+rwx" };
    if let Err(e) = run_checked("chmod", &[mode, dir]).await {
        warn!(dir, mode, error = %e, "Could not change mode, continuing");
        degraded = true;
    }

    Ok(PreparedDir {
        path: dir.to_string(),
        created,
        degraded,
    })
}

/// Recursively chown a path, tolerating failure. Returns whether the
/// ownership change actually applied.
///
/// Also used on single files and for the pre-drop re-chown of the data
/// volume before the server starts as the runtime user.
pub async fn set_ownership(path: &str, owner: &str) -> bool {
    match timeout(CHOWN_TIMEOUT, run_checked("chown", &["-R", owner, path])).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            warn!(path, owner, error = %e, "Could not change ownership, continuing");
            false
        }
        Err(_) => {
            warn!(
                path,
                owner,
                timeout_secs = CHOWN_TIMEOUT.as_secs(),
                "chown timed out, continuing"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{Gid, Uid};
    use std::os::unix::fs::PermissionsExt;

    fn current_owner() -> String {
        format!("{}:{}", Uid::current(), Gid::current())
    }

    #[tokio::test]
    async fn creates_missing_directory_with_group_access() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("data/db");
        let dir = dir.to_str().unwrap();

        let prepared = prepare_one(dir, &current_owner(), true).await.unwrap();
        assert!(prepared.created);

        let mode = std::fs::metadata(dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o070, 0o070, "group bits missing: {:o}", mode);
        assert_eq!(mode & 0o007, 0, "other bits not stripped: {:o}", mode);
    }

    #[tokio::test]
    async fn reruns_are_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("log");
        let dir = dir.to_str().unwrap();

        let first = prepare_one(dir, &current_owner(), false).await.unwrap();
        let second = prepare_one(dir, &current_owner(), false).await.unwrap();
        assert!(first.created);
        assert!(!second.created);

        let mode = std::fs::metadata(dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o070, 0o070);
    }

    #[tokio::test]
    async fn unassignable_owner_degrades_but_proceeds() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("conf");
        let dir = dir.to_str().unwrap();

        let prepared = prepare_one(dir, "472147:472147", true).await.unwrap();
        // degraded when unprivileged, clean under root; created either way
        assert!(prepared.created);
        if !Uid::effective().is_root() {
            assert!(prepared.degraded);
        }
    }
}
