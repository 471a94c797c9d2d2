//! Shared utilities for the mongodb container binaries
//!
//! This crate provides common functionality used by both the entrypoint
//! and the health probe:
//! - Structured logging initialization
//! - Environment variable parsing helpers
//! - Command execution utilities (including the admin shell)
//! - Process discovery via /proc

pub mod command;
pub mod config;
pub mod logging;
pub mod process;

pub use command::mongosh_eval;
pub use config::{ConfigExt, K8sEnv};
pub use logging::init_logging;
