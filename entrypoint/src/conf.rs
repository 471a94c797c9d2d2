//! Server configuration materialization
//!
//! Writes the effective mongod.conf on every boot: either an operator
//! template adopted verbatim or a generated default, with the replica
//! set section appended when the template does not already declare one.

use crate::config::RuntimeConfig;
use crate::dirs::set_ownership;
use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::info;

/// Render the default configuration document.
///
/// Deterministic for a given config, so unchanged settings produce a
/// byte-identical file across restarts.
fn render_default(config: &RuntimeConfig) -> String {
    format!(
        r#"storage:
  dbPath: {data_dir}
  journal:
    enabled: true
systemLog:
  destination: file
  path: {log_file}
  logAppend: true
  logRotate: reopen
net:
  port: {port}
  bindIp: 0.0.0.0
processManagement:
  fork: false
security:
  authorization: disabled
"#,
        data_dir = config.data_dir,
        log_file = config.log_file(),
        port = config.port,
    )
}

/// True when the document already declares a top-level replication section.
///
/// Parsed as YAML when possible; a template that fails to parse falls
/// back to a column-zero line scan so we still never duplicate the key.
fn has_replication_section(doc: &str) -> bool {
    match serde_yaml::from_str::<serde_yaml::Value>(doc) {
        Ok(value) => value.get("replication").is_some(),
        Err(_) => doc.lines().any(|line| line.starts_with("replication:")),
    }
}

/// Produce the full document from an optional template.
fn render(config: &RuntimeConfig, template: Option<&str>) -> String {
    let mut doc = match template {
        Some(t) => t.to_string(),
        None => render_default(config),
    };

    if !config.replica_set_name.is_empty() && !has_replication_section(&doc) {
        if !doc.ends_with('\n') {
            doc.push('\n');
        }
        doc.push_str(&format!(
            "replication:\n  replSetName: {}\n",
            config.replica_set_name
        ));
    }

    doc
}

/// Write the effective config file with mode 640 and return its path.
pub async fn materialize(config: &RuntimeConfig) -> Result<String> {
    let template_path = config.config_template();
    let template = if Path::new(&template_path).exists() {
        info!(path = %template_path, "Using configuration template");
        Some(
            fs::read_to_string(&template_path)
                .with_context(|| format!("Failed to read {}", template_path))?,
        )
    } else {
        None
    };

    let doc = render(config, template.as_deref());
    let path = config.config_file();
    fs::write(&path, &doc).with_context(|| format!("Failed to write {}", path))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640))
        .with_context(|| format!("Failed to set permissions on {}", path))?;
    set_ownership(&path, &config.owner()).await;

    info!(path = %path, template = template.is_some(), "Configuration written");
    Ok(path)
}
