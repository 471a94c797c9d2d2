//! Root credential staging for first-run bootstrap
//!
//! The server image's init machinery creates the root user only when it
//! sees credentials in its environment on a fresh data directory. We
//! resolve each credential from either a direct variable or a
//! `*_FILE` secret mount, and stage the results onto the child's spawn
//! environment without touching our own.

use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Files whose presence marks an already initialized data directory.
const STORAGE_MARKER: &str = "WiredTiger";
const LOCK_FILE: &str = "mongod.lock";

const ROOT_USERNAME: &str = "MONGO_INITDB_ROOT_USERNAME";
const ROOT_PASSWORD: &str = "MONGO_INITDB_ROOT_PASSWORD";
const INIT_DATABASE: &str = "MONGO_INITDB_DATABASE";
const DEFAULT_INIT_DATABASE: &str = "admin";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{var} and {var}_FILE are mutually exclusive")]
    Conflict { var: &'static str },
    #[error("failed to read {path} for {var}_FILE")]
    FileRead {
        var: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Environment adjustments applied to the launched server process only.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StagedCredentials {
    /// Variables set on the child.
    pub exports: Vec<(&'static str, String)>,
    /// Variables removed from the child after file resolution.
    pub scrubbed: Vec<String>,
}

impl StagedCredentials {
    pub fn is_staged(&self) -> bool {
        !self.exports.is_empty()
    }
}

/// A data directory with neither storage engine files nor a lock file
/// has never run a server and is eligible for bootstrap.
pub fn is_fresh_install(data_dir: &str) -> bool {
    let data_dir = Path::new(data_dir);
    !data_dir.join(STORAGE_MARKER).exists() && !data_dir.join(LOCK_FILE).exists()
}

/// Resolve one VAR / VAR_FILE pair.
///
/// Empty values count as unset, direct and file contents alike, matching
/// how secret tooling leaves placeholder variables and files behind.
fn resolve(
    var: &'static str,
    direct: Option<String>,
    file: Option<String>,
) -> Result<Option<String>, CredentialError> {
    let direct = direct.filter(|v| !v.is_empty());
    let file = file.filter(|v| !v.is_empty());

    match (direct, file) {
        (Some(_), Some(_)) => Err(CredentialError::Conflict { var }),
        (Some(value), None) => Ok(Some(value)),
        (None, Some(path)) => fs::read_to_string(&path)
            .map(|contents| Some(contents.trim().to_string()).filter(|v| !v.is_empty()))
            .map_err(|source| CredentialError::FileRead { var, path, source }),
        (None, None) => Ok(None),
    }
}

fn resolve_from_env(var: &'static str) -> Result<Option<String>, CredentialError> {
    let file_var = format!("{}_FILE", var);
    resolve(var, env::var(var).ok(), env::var(file_var).ok())
}

/// Decide whether this boot should bootstrap the root user and stage
/// the credentials for the child process if so.
///
/// On an initialized data directory nothing is resolved or scrubbed;
/// the server enforces whatever users already exist on disk.
pub fn stage_for_bootstrap(data_dir: &str) -> Result<StagedCredentials, CredentialError> {
    if !is_fresh_install(data_dir) {
        info!(data_dir, "Found existing database files, skipping credential staging");
        return Ok(StagedCredentials::default());
    }
    info!(data_dir, "Fresh data directory detected");

    let username = resolve_from_env(ROOT_USERNAME)?;
    let password = resolve_from_env(ROOT_PASSWORD)?;
    let database = resolve_from_env(INIT_DATABASE)?;

    // Secret file references must not leak into the server process.
    let scrubbed = vec![
        format!("{}_FILE", ROOT_USERNAME),
        format!("{}_FILE", ROOT_PASSWORD),
        format!("{}_FILE", INIT_DATABASE),
    ];

    let mut exports = Vec::new();
    match (username, password) {
        (Some(user), Some(pass)) => {
            exports.push((ROOT_USERNAME, user));
            exports.push((ROOT_PASSWORD, pass));
            exports.push((
                INIT_DATABASE,
                database.unwrap_or_else(|| DEFAULT_INIT_DATABASE.to_string()),
            ));
            info!("Staged root credentials for first-run bootstrap");
        }
        _ => info!("Root credentials not fully configured, skipping bootstrap staging"),
    }

    Ok(StagedCredentials { exports, scrubbed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fresh_install_requires_absence_of_both_markers() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().to_str().unwrap();
        assert!(is_fresh_install(dir));

        fs::write(tmp.path().join("WiredTiger"), "").unwrap();
        assert!(!is_fresh_install(dir));

        fs::remove_file(tmp.path().join("WiredTiger")).unwrap();
        fs::write(tmp.path().join("mongod.lock"), "").unwrap();
        assert!(!is_fresh_install(dir));
    }

    #[test]
    fn direct_value_wins_when_alone() {
        let got = resolve("MONGO_INITDB_ROOT_USERNAME", Some("root".to_string()), None).unwrap();
        assert_eq!(got, Some("root".to_string()));
    }

    #[test]
    fn file_value_is_read_and_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s3cret").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let got = resolve("MONGO_INITDB_ROOT_PASSWORD", None, Some(path)).unwrap();
        assert_eq!(got, Some("s3cret".to_string()));
    }

    #[test]
    fn both_set_is_a_conflict() {
        let err = resolve(
            "MONGO_INITDB_ROOT_PASSWORD",
            Some("a".to_string()),
            Some("/run/secrets/pw".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, CredentialError::Conflict { .. }));
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn empty_direct_value_defers_to_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "frompath").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let got = resolve(
            "MONGO_INITDB_ROOT_USERNAME",
            Some(String::new()),
            Some(path),
        )
        .unwrap();
        assert_eq!(got, Some("frompath".to_string()));
    }

    #[test]
    fn whitespace_only_file_counts_as_unset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "  \n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let got = resolve("MONGO_INITDB_ROOT_PASSWORD", None, Some(path)).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = resolve(
            "MONGO_INITDB_ROOT_USERNAME",
            None,
            Some("/nonexistent/secret".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, CredentialError::FileRead { .. }));
    }

    #[test]
    fn neither_set_resolves_to_none() {
        let got = resolve("MONGO_INITDB_DATABASE", None, None).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn initialized_directory_stages_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("WiredTiger"), "").unwrap();

        let staged = stage_for_bootstrap(tmp.path().to_str().unwrap()).unwrap();
        assert!(!staged.is_staged());
        assert!(staged.scrubbed.is_empty());
    }
}
