//! Environment variable parsing helpers
//!
//! Provides ergonomic helpers for reading configuration from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Extension trait for parsing environment variables.
///
/// Provides convenient methods for reading env vars with defaults, required values,
/// and type parsing.
pub trait ConfigExt {
    /// Get an environment variable with a default value.
    ///
    /// # Example
    /// ```ignore
    /// let data_dir = String::env_or("MONGODB_DATA_DIR", "/data/db");
    /// ```
    fn env_or(name: &str, default: &str) -> String {
        env::var(name).unwrap_or_else(|_| default.to_string())
    }

    /// Get a required environment variable, returning an error if not set.
    ///
    /// # Example
    /// ```ignore
    /// let set_name = String::env_required("REPLICA_SET_NAME")?;
    /// ```
    fn env_required(name: &str) -> Result<String> {
        env::var(name).context(format!("{} must be set", name))
    }

    /// Get an environment variable as a boolean.
    ///
    /// Returns `true` if the value is "true" (case-insensitive), otherwise `default`.
    fn env_bool(name: &str, default: bool) -> bool {
        env::var(name)
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(default)
    }

    /// Get an environment variable parsed as a specific type.
    ///
    /// Returns `default` if the variable is not set or fails to parse.
    ///
    /// # Example
    /// ```ignore
    /// let port: u16 = u16::env_parse("MONGODB_PORT", 27017);
    /// ```
    fn env_parse<T: FromStr>(name: &str, default: T) -> T {
        env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

// Blanket implementation for all types
impl<T> ConfigExt for T {}

/// Kubernetes-specific environment helpers.
///
/// The orchestrator injects these for log context only; none of them
/// changes runtime behavior.
pub struct K8sEnv;

impl K8sEnv {
    /// Check if running inside a Kubernetes pod.
    pub fn is_kubernetes() -> bool {
        env::var("KUBERNETES_SERVICE_HOST").is_ok()
    }

    /// Get the namespace this pod runs in.
    pub fn namespace() -> String {
        env::var("K8S_NAMESPACE").unwrap_or_default()
    }

    /// Get the pod name.
    pub fn pod_name() -> String {
        env::var("K8S_POD_NAME").unwrap_or_default()
    }

    /// Get the headless service name used for replica set discovery.
    pub fn service_name() -> String {
        env::var("K8S_SERVICE_NAME").unwrap_or_default()
    }
}
