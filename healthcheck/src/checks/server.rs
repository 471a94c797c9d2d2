//! Checks issued through the administrative shell
//!
//! Every remote check runs a small JavaScript snippet that prints a
//! single JSON document, then classifies the parsed reply. Failures to
//! spawn the shell, connect, or parse all fail the check; the probe
//! itself never panics on server weirdness.

use super::CheckOutcome;
use crate::config::Config;
use crate::plan::{CheckKind, ProbePolicy};
use anyhow::{anyhow, Result};
use chrono::Utc;
use common::command::mongosh_eval;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::info;
use uuid::Uuid;

/// Pause between connectivity attempts. Fixed, not exponential.
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Collection the read-write check scribbles in.
const PROBE_COLLECTION: &str = "_healthcheck";

async fn eval_bounded(config: &Config, policy: &ProbePolicy, eval: &str) -> Result<String> {
    timeout(policy.timeout, mongosh_eval(&config.host, config.port, eval))
        .await
        .map_err(|_| anyhow!("timed out after {:?}", policy.timeout))?
}

/// The shell may print driver warnings ahead of the reply; the JSON
/// document is always the last non-empty line.
fn json_payload(reply: &str) -> &str {
    reply
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
        .trim()
}

#[derive(Debug, Deserialize)]
struct OkReply {
    #[serde(default)]
    ok: f64,
}

fn reply_ok(reply: &str) -> bool {
    serde_json::from_str::<OkReply>(json_payload(reply))
        .map(|r| r.ok == 1.0)
        .unwrap_or(false)
}

/// Administrative ping. The only check with its own retry loop; it
/// models the window where the process exists but is not accepting
/// connections yet.
pub async fn check_connectivity(config: &Config, policy: &ProbePolicy) -> CheckOutcome {
    let name = CheckKind::Connectivity.name();
    let eval = "print(JSON.stringify(db.adminCommand({ping: 1})))";

    let mut last_error = String::new();
    for attempt in 1..=policy.retries.max(1) {
        match eval_bounded(config, policy, eval).await {
            Ok(reply) if reply_ok(&reply) => {
                return CheckOutcome::pass(
                    name,
                    format!("server answered ping (attempt {})", attempt),
                );
            }
            Ok(reply) => {
                last_error = format!("unexpected ping reply: {}", json_payload(&reply));
            }
            Err(e) => {
                last_error = e.to_string();
            }
        }
        if attempt < policy.retries {
            info!(check = name, attempt, "Ping failed, retrying");
            sleep(RETRY_PAUSE).await;
        }
    }

    CheckOutcome::fail(
        name,
        format!(
            "no ping response after {} attempt(s): {}",
            policy.retries.max(1),
            last_error
        ),
    )
}

#[derive(Debug, Deserialize)]
struct StatusReply {
    #[serde(default)]
    ok: f64,
    #[serde(default)]
    uptime: f64,
}

/// serverStatus reports ok only once the storage engine is answering.
pub async fn check_server_status(config: &Config, policy: &ProbePolicy) -> CheckOutcome {
    let name = CheckKind::ServerStatus.name();
    let eval = "const s = db.adminCommand({serverStatus: 1}); \
                print(JSON.stringify({ok: s.ok, uptime: s.uptime}))";

    match eval_bounded(config, policy, eval).await {
        Ok(reply) => match serde_json::from_str::<StatusReply>(json_payload(&reply)) {
            Ok(status) if status.ok == 1.0 => CheckOutcome::pass(
                name,
                format!("serverStatus ok, uptime {}s", status.uptime as u64),
            ),
            Ok(status) => {
                CheckOutcome::fail(name, format!("serverStatus reported ok={}", status.ok))
            }
            Err(e) => CheckOutcome::fail(name, format!("unparseable serverStatus reply: {}", e)),
        },
        Err(e) => CheckOutcome::fail(name, e.to_string()),
    }
}

/// Insert, read back, and delete a probe document.
///
/// Catches the state where the server accepts connections but cannot
/// serve writes (disk full, storage engine wedged, fcv migration).
pub async fn check_read_write(config: &Config, policy: &ProbePolicy) -> CheckOutcome {
    let name = CheckKind::ReadWrite.name();
    let probe_id = Uuid::new_v4();
    let eval = format!(
        "const coll = db.getSiblingDB('{db}').getCollection('{coll}'); \
         coll.insertOne({{_id: '{id}', at: '{at}'}}); \
         const doc = coll.findOne({{_id: '{id}'}}); \
         coll.deleteOne({{_id: '{id}'}}); \
         if (!doc) {{ throw new Error('read-back returned nothing'); }} \
         print(JSON.stringify({{ok: 1}}))",
        db = config.database,
        coll = PROBE_COLLECTION,
        id = probe_id,
        at = Utc::now().to_rfc3339(),
    );

    match eval_bounded(config, policy, &eval).await {
        Ok(reply) if reply_ok(&reply) => CheckOutcome::pass(
            name,
            format!("write/read/delete round trip ok ({})", probe_id),
        ),
        Ok(reply) => CheckOutcome::fail(
            name,
            format!("round trip reply not ok: {}", json_payload(&reply)),
        ),
        Err(e) => CheckOutcome::fail(name, e.to_string()),
    }
}

/// Error codes replSetGetStatus returns on a standalone server.
const NOT_YET_INITIALIZED: i64 = 94;
const NO_REPLICATION_ENABLED: i64 = 76;

#[derive(Debug, Deserialize)]
struct ReplicaSetReply {
    #[serde(default)]
    ok: f64,
    #[serde(rename = "myState")]
    my_state: Option<i64>,
    set: Option<String>,
    code: Option<i64>,
    #[serde(rename = "codeName")]
    code_name: Option<String>,
}

fn replica_state_name(state: i64) -> &'static str {
    match state {
        0 => "STARTUP",
        1 => "PRIMARY",
        2 => "SECONDARY",
        3 => "RECOVERING",
        5 => "STARTUP2",
        6 => "UNKNOWN",
        7 => "ARBITER",
        8 => "DOWN",
        9 => "ROLLBACK",
        10 => "REMOVED",
        _ => "INVALID",
    }
}

/// Classify a replSetGetStatus reply.
///
/// Standalone servers answer with an error we treat as healthy; a
/// configured member is healthy only as PRIMARY or SECONDARY.
fn classify_replica_reply(payload: &str) -> CheckOutcome {
    let name = CheckKind::ReplicaSet.name();

    let reply: ReplicaSetReply = match serde_json::from_str(payload) {
        Ok(reply) => reply,
        Err(e) => {
            return CheckOutcome::fail(name, format!("unparseable replica set reply: {}", e))
        }
    };

    if reply.ok == 1.0 {
        let set = reply.set.unwrap_or_default();
        return match reply.my_state {
            Some(state @ (1 | 2)) => CheckOutcome::pass(
                name,
                format!("member of '{}' as {}", set, replica_state_name(state)),
            ),
            Some(state) => CheckOutcome::fail(
                name,
                format!(
                    "member of '{}' in state {} ({})",
                    set,
                    state,
                    replica_state_name(state)
                ),
            ),
            None => CheckOutcome::fail(name, "status reply carried no member state".to_string()),
        };
    }

    match reply.code {
        Some(NOT_YET_INITIALIZED) | Some(NO_REPLICATION_ENABLED) => CheckOutcome::pass(
            name,
            format!(
                "replication not configured ({}), standalone is healthy",
                reply.code_name.unwrap_or_else(|| "unknown".to_string())
            ),
        ),
        Some(code) => CheckOutcome::fail(
            name,
            format!(
                "replSetGetStatus failed with code {} ({})",
                code,
                reply.code_name.unwrap_or_else(|| "unknown".to_string())
            ),
        ),
        None => CheckOutcome::fail(name, "replSetGetStatus failed without an error code".to_string()),
    }
}

/// Replica-set membership, with standalone treated as healthy.
pub async fn check_replica_set(config: &Config, policy: &ProbePolicy) -> CheckOutcome {
    let name = CheckKind::ReplicaSet.name();
    let eval = "let r; \
                try { const s = db.adminCommand({replSetGetStatus: 1}); \
                      r = {ok: s.ok, myState: s.myState, set: s.set}; } \
                catch (e) { r = {ok: 0, code: e.code, codeName: e.codeName}; } \
                print(JSON.stringify(r))";

    match eval_bounded(config, policy, eval).await {
        Ok(reply) => classify_replica_reply(json_payload(&reply)),
        Err(e) => CheckOutcome::fail(name, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_last_nonempty_line() {
        let reply = "Warning: connecting without TLS\n\n{\"ok\": 1}\n";
        assert_eq!(json_payload(reply), "{\"ok\": 1}");
        assert_eq!(json_payload(""), "");
    }

    #[test]
    fn ping_reply_classification() {
        assert!(reply_ok("{\"ok\": 1}"));
        assert!(reply_ok("{\"ok\": 1.0}"));
        assert!(!reply_ok("{\"ok\": 0}"));
        assert!(!reply_ok("not json"));
        assert!(!reply_ok("{}"));
    }

    #[test]
    fn primary_and_secondary_are_healthy() {
        for state in [1, 2] {
            let payload = format!("{{\"ok\": 1, \"myState\": {}, \"set\": \"rs0\"}}", state);
            let outcome = classify_replica_reply(&payload);
            assert!(outcome.passed, "state {} should pass: {}", state, outcome.detail);
            assert!(outcome.detail.contains("rs0"));
        }
    }

    #[test]
    fn other_member_states_fail() {
        for state in [0, 3, 5, 6, 8, 9, 10] {
            let payload = format!("{{\"ok\": 1, \"myState\": {}, \"set\": \"rs0\"}}", state);
            assert!(
                !classify_replica_reply(&payload).passed,
                "state {} should fail",
                state
            );
        }
    }

    #[test]
    fn standalone_is_healthy() {
        let not_initialized =
            "{\"ok\": 0, \"code\": 94, \"codeName\": \"NotYetInitialized\"}";
        let outcome = classify_replica_reply(not_initialized);
        assert!(outcome.passed);
        assert!(outcome.detail.contains("NotYetInitialized"));

        let no_replication =
            "{\"ok\": 0, \"code\": 76, \"codeName\": \"NoReplicationEnabled\"}";
        assert!(classify_replica_reply(no_replication).passed);
    }

    #[test]
    fn other_status_errors_fail() {
        let unauthorized = "{\"ok\": 0, \"code\": 13, \"codeName\": \"Unauthorized\"}";
        let outcome = classify_replica_reply(unauthorized);
        assert!(!outcome.passed);
        assert!(outcome.detail.contains("13"));

        assert!(!classify_replica_reply("{\"ok\": 0}").passed);
        assert!(!classify_replica_reply("garbage").passed);
    }

    #[test]
    fn state_names_cover_the_protocol_range() {
        assert_eq!(replica_state_name(1), "PRIMARY");
        assert_eq!(replica_state_name(2), "SECONDARY");
        assert_eq!(replica_state_name(42), "INVALID");
    }
}
