//! Entrypoint configuration from environment variables

use common::ConfigExt;

/// Scratch directory recreated on every boot alongside the persistent dirs.
pub const SCRATCH_DIR: &str = "/tmp/mongodb";

/// Runtime configuration resolved once at startup.
///
/// All knobs come from the environment with container-friendly defaults.
/// The struct is immutable after construction; anything the launched
/// server must see goes through its spawn environment, never back into
/// ours.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_dir: String,
    pub log_dir: String,
    pub config_dir: String,
    pub user: String,
    pub uid: u32,
    pub gid: u32,
    pub port: u16,
    pub replica_set_name: String,
    /// Seconds to wait for the server port to be released by a previous run.
    pub port_wait_retries: u32,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: String::env_or("MONGODB_DATA_DIR", "/data/db"),
            log_dir: String::env_or("MONGODB_LOG_DIR", "/var/log/mongodb"),
            config_dir: String::env_or("MONGODB_CONFIG_DIR", "/etc/mongodb"),
            user: String::env_or("MONGODB_USER", "mongodb"),
            uid: u32::env_parse("MONGODB_UID", 1001),
            gid: u32::env_parse("MONGODB_GID", 0),
            port: u16::env_parse("MONGODB_PORT", 27017),
            replica_set_name: String::env_or("REPLICA_SET_NAME", "rs0"),
            port_wait_retries: u32::env_parse("MONGODB_PORT_WAIT_RETRIES", 30),
        }
    }

    /// Numeric `uid:gid` owner spec for chown and the privilege drop.
    pub fn owner(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }

    pub fn config_file(&self) -> String {
        format!("{}/mongod.conf", self.config_dir)
    }

    /// Optional operator-provided template adopted verbatim when present.
    pub fn config_template(&self) -> String {
        format!("{}/mongod.conf.template", self.config_dir)
    }

    pub fn log_file(&self) -> String {
        format!("{}/mongod.log", self.log_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RuntimeConfig {
        RuntimeConfig {
            data_dir: "/data/db".to_string(),
            log_dir: "/var/log/mongodb".to_string(),
            config_dir: "/etc/mongodb".to_string(),
            user: "mongodb".to_string(),
            uid: 1001,
            gid: 0,
            port: 27017,
            replica_set_name: "rs0".to_string(),
            port_wait_retries: 30,
        }
    }

    #[test]
    fn derived_paths() {
        let config = test_config();
        assert_eq!(config.config_file(), "/etc/mongodb/mongod.conf");
        assert_eq!(config.config_template(), "/etc/mongodb/mongod.conf.template");
        assert_eq!(config.log_file(), "/var/log/mongodb/mongod.log");
        assert_eq!(config.owner(), "1001:0");
    }
}
