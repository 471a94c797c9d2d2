//! Probe configuration from environment variables

use common::ConfigExt;
use std::time::Duration;

/// Connection and threshold settings shared by every check.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Database the read-write check scribbles in.
    pub database: String,
    pub timeout: Duration,
    pub retries: u32,
    pub data_dir: String,
    pub log_dir: String,
    pub min_free_disk_percent: f64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: String::env_or("MONGODB_HOST", "localhost"),
            port: u16::env_parse("MONGODB_PORT", 27017),
            database: String::env_or("MONGODB_DATABASE", "admin"),
            timeout: Duration::from_secs(u64::env_parse("HEALTH_CHECK_TIMEOUT", 10)),
            retries: u32::env_parse("HEALTH_CHECK_RETRIES", 3),
            data_dir: String::env_or("MONGODB_DATA_DIR", "/data/db"),
            log_dir: String::env_or("MONGODB_LOG_DIR", "/var/log/mongodb"),
            min_free_disk_percent: f64::env_parse("MIN_FREE_DISK_PERCENT", 10.0),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "localhost".to_string(),
        port: 27017,
        database: "admin".to_string(),
        timeout: Duration::from_secs(10),
        retries: 3,
        data_dir: "/data/db".to_string(),
        log_dir: "/var/log/mongodb".to_string(),
        min_free_disk_percent: 10.0,
    }
}
