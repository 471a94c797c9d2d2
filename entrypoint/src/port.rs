//! Wait for the server port to be released
//!
//! After an unclean container restart the previous server (or a
//! TIME_WAIT socket) may still hold the listen port. Probe by binding
//! it ourselves and give the holder a bounded grace period.

use crate::config::RuntimeConfig;
use crate::shutdown::{graceful_shutdown, Shutdown};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait until the configured port can be bound, one attempt per second.
///
/// Best effort: when the budget runs out we proceed anyway and let the
/// server report the real bind error. Returns whether the port was
/// observed free. A termination signal during the wait shuts the
/// entrypoint down cleanly.
pub async fn wait_until_free(config: &RuntimeConfig, shutdown: &mut Shutdown) -> bool {
    let addr = format!("0.0.0.0:{}", config.port);

    for attempt in 1..=config.port_wait_retries {
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                drop(listener);
                if attempt > 1 {
                    info!(port = config.port, attempt, "Port released");
                }
                return true;
            }
            Err(e) => {
                info!(port = config.port, attempt, error = %e, "Port still in use, waiting");
            }
        }

        tokio::select! {
            sig = shutdown.recv() => {
                info!(signal = %sig, "Received termination signal while waiting for port");
                graceful_shutdown(config.port, None).await;
                std::process::exit(0);
            }
            _ = sleep(Duration::from_secs(1)) => {}
        }
    }

    warn!(
        port = config.port,
        retries = config.port_wait_retries,
        "Port still in use after wait budget, starting anyway"
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn free_port_returns_immediately() {
        // Grab an ephemeral port, release it, then expect a single-attempt pass.
        let listener = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = RuntimeConfig {
            port,
            port_wait_retries: 3,
            ..test_config()
        };
        let mut shutdown = Shutdown::install().unwrap();
        assert!(wait_until_free(&config, &mut shutdown).await);
    }

    #[tokio::test]
    async fn occupied_port_exhausts_budget() {
        let listener = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = RuntimeConfig {
            port,
            port_wait_retries: 2,
            ..test_config()
        };
        let mut shutdown = Shutdown::install().unwrap();
        assert!(!wait_until_free(&config, &mut shutdown).await);
    }

    fn test_config() -> RuntimeConfig {
        RuntimeConfig {
            data_dir: "/tmp/x/data".to_string(),
            log_dir: "/tmp/x/log".to_string(),
            config_dir: "/tmp/x/conf".to_string(),
            user: "mongodb".to_string(),
            uid: 1001,
            gid: 0,
            port: 27017,
            replica_set_name: "rs0".to_string(),
            port_wait_retries: 30,
        }
    }
}
