//! Free-space checks for the data and log volumes

use super::CheckOutcome;
use crate::config::Config;
use crate::plan::CheckKind;
use anyhow::{Context, Result};
use nix::sys::statvfs::statvfs;

/// Percentage of blocks still available to unprivileged writers.
fn free_percent(path: &str) -> Result<f64> {
    let stat = statvfs(path).with_context(|| format!("statvfs failed for {}", path))?;
    let total = stat.blocks() as f64;
    if total == 0.0 {
        // Pseudo-filesystems report zero blocks; nothing to measure.
        return Ok(100.0);
    }
    Ok(stat.blocks_available() as f64 / total * 100.0)
}

/// Both volumes must clear the configured minimum. Unstattable paths
/// fail the check rather than passing silently.
pub fn check(config: &Config) -> CheckOutcome {
    let name = CheckKind::DiskCapacity.name();
    let mut failures = Vec::new();
    let mut details = Vec::new();

    for dir in [&config.data_dir, &config.log_dir] {
        match free_percent(dir) {
            Ok(pct) if pct < config.min_free_disk_percent => failures.push(format!(
                "{}: {:.1}% free, need {:.1}%",
                dir, pct, config.min_free_disk_percent
            )),
            Ok(pct) => details.push(format!("{}: {:.1}% free", dir, pct)),
            Err(e) => failures.push(format!("{}: {:#}", dir, e)),
        }
    }

    if failures.is_empty() {
        CheckOutcome::pass(name, details.join(", "))
    } else {
        CheckOutcome::fail(name, failures.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn root_filesystem_is_measurable() {
        let pct = free_percent("/").unwrap();
        assert!((0.0..=100.0).contains(&pct), "got {}", pct);
    }

    #[test]
    fn missing_path_is_an_error() {
        assert!(free_percent("/nonexistent/path/for/sure").is_err());
    }

    #[test]
    fn missing_volume_fails_the_check() {
        let mut config = test_config();
        config.data_dir = "/nonexistent/data".to_string();
        config.log_dir = "/tmp".to_string();
        config.min_free_disk_percent = 0.0;

        let outcome = check(&config);
        assert!(!outcome.passed);
        assert!(outcome.detail.contains("/nonexistent/data"));
    }

    #[test]
    fn generous_threshold_passes_on_tmp() {
        let mut config = test_config();
        config.data_dir = "/tmp".to_string();
        config.log_dir = "/tmp".to_string();
        config.min_free_disk_percent = 0.0;

        let outcome = check(&config);
        assert!(outcome.passed, "{}", outcome.detail);
    }

    #[test]
    fn impossible_threshold_fails() {
        let mut config = test_config();
        config.data_dir = "/tmp".to_string();
        config.log_dir = "/tmp".to_string();
        config.min_free_disk_percent = 101.0;

        let outcome = check(&config);
        assert!(!outcome.passed);
    }
}
