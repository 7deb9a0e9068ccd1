//! Chain append path
//!
//! An event's hash is `SHA-256(prev_hash || "|" || canonical(core))` where
//! `core` is the event minus its id and hashes, rendered as canonical JSON.
//! The timestamp inside `core` is rendered at fixed microsecond precision
//! so that re-reading the row from TIMESTAMPTZ storage reproduces the exact
//! bytes that were hashed.
//!
//! Concurrent appenders to the same chain serialize on a per-chain
//! advisory lock taken inside the insert transaction, which guarantees
//! that every committed event's `prev_hash` equals the hash of the
//! committed predecessor.

use chrono::{DateTime, Timelike, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use wallgrid_common::{canonical_json, sha256_hex, ZERO_HASH};

use crate::error::Result;

/// A committed audit event
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEvent {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub chain_id: String,
    pub action: String,
    pub actor: String,
    pub object_type: String,
    pub object_id: String,
    pub details: serde_json::Value,
    pub prev_hash: String,
    pub hash: String,
}

/// An event waiting to be appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub action: String,
    pub actor: String,
    pub object_type: String,
    pub object_id: String,
    #[serde(default = "empty_details")]
    pub details: serde_json::Value,
}

fn empty_details() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Fixed-precision UTC rendering used inside the hashed core.
///
/// Postgres TIMESTAMPTZ stores microseconds; rendering anything finer
/// would break hash recomputation after a round-trip through storage.
pub fn chain_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Truncate a timestamp to the microsecond precision the store keeps.
pub fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(ts.nanosecond() / 1_000 * 1_000).unwrap_or(ts)
}

/// Canonical core of an event: everything except id, prev_hash and hash.
pub fn event_core(
    ts: &DateTime<Utc>,
    chain_id: &str,
    action: &str,
    actor: &str,
    object_type: &str,
    object_id: &str,
    details: &serde_json::Value,
) -> String {
    canonical_json(&json!({
        "ts": chain_timestamp(ts),
        "chain_id": chain_id,
        "action": action,
        "actor": actor,
        "object_type": object_type,
        "object_id": object_id,
        "details": details,
    }))
}

/// Hash of one link: prev hash, a pipe separator, then the canonical core.
pub fn chain_hash(prev_hash: &str, core: &str) -> String {
    let mut buf = Vec::with_capacity(prev_hash.len() + 1 + core.len());
    buf.extend_from_slice(prev_hash.as_bytes());
    buf.push(b'|');
    buf.extend_from_slice(core.as_bytes());
    sha256_hex(&buf)
}

/// Append one event to a chain inside an open transaction.
///
/// Takes the chain's advisory lock, reads the tip, computes the new hash,
/// inserts. The lock is released when the caller's transaction ends, so a
/// rollback of the surrounding work also discards the event — callers can
/// bundle an entity write and its audit record into one commit.
pub async fn append_event_tx(
    conn: &mut PgConnection,
    chain_id: &str,
    ev: NewEvent,
) -> Result<AuditEvent> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
        .bind(chain_id)
        .execute(&mut *conn)
        .await?;

    let tip: Option<String> =
        sqlx::query_scalar("SELECT hash FROM audit_events WHERE chain_id=$1 ORDER BY id DESC LIMIT 1")
            .bind(chain_id)
            .fetch_optional(&mut *conn)
            .await?;
    let prev_hash = tip.unwrap_or_else(|| ZERO_HASH.to_string());

    let ts = truncate_to_micros(Utc::now());
    let core = event_core(
        &ts,
        chain_id,
        &ev.action,
        &ev.actor,
        &ev.object_type,
        &ev.object_id,
        &ev.details,
    );
    let hash = chain_hash(&prev_hash, &core);

    let event = sqlx::query_as::<_, AuditEvent>(
        r#"
        INSERT INTO audit_events (ts, chain_id, action, actor, object_type, object_id, details, prev_hash, hash)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        RETURNING id, ts, chain_id, action, actor, object_type, object_id, details, prev_hash, hash
        "#,
    )
    .bind(ts)
    .bind(chain_id)
    .bind(&ev.action)
    .bind(&ev.actor)
    .bind(&ev.object_type)
    .bind(&ev.object_id)
    .bind(&ev.details)
    .bind(&prev_hash)
    .bind(&hash)
    .fetch_one(&mut *conn)
    .await?;

    counter!("audit.chain.appended", "chain" => chain_id.to_string()).increment(1);
    debug!("🔗 Appended audit event {} to chain {}", event.id, chain_id);
    Ok(event)
}

/// Append one event in its own transaction.
#[instrument(level = "debug", skip(pool, ev))]
pub async fn append_event(pool: &PgPool, chain_id: &str, ev: NewEvent) -> Result<AuditEvent> {
    let mut tx = pool.begin().await?;
    let event = append_event_tx(&mut tx, chain_id, ev).await?;
    tx.commit().await?;
    Ok(event)
}

impl NewEvent {
    /// Convenience constructor for embedded callers.
    pub fn new(
        action: impl Into<String>,
        actor: impl Into<String>,
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            action: action.into(),
            actor: actor.into(),
            object_type: object_type.into(),
            object_id: object_id.into(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_chain_timestamp_fixed_width() {
        let ts = DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(chain_timestamp(&ts), "2026-03-01T08:00:00.000000+00:00");

        let ts = DateTime::parse_from_rfc3339("2026-03-01T08:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let truncated = truncate_to_micros(ts);
        assert_eq!(chain_timestamp(&truncated), "2026-03-01T08:00:00.123456+00:00");
    }

    #[test]
    fn test_event_core_is_sorted_and_compact() {
        let ts = DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let core = event_core(
            &ts,
            "chain-a",
            "walls.create",
            "alice",
            "wall",
            "1",
            &serde_json::json!({"name": "ops-wall"}),
        );
        assert!(core.starts_with(r#"{"action":"walls.create","actor":"alice","#));
        assert!(!core.contains(": "));
        assert!(core.contains(r#""ts":"2026-03-01T08:00:00.000000+00:00""#));
    }

    #[test]
    fn test_chain_hash_links_previous() {
        let core = "{}";
        let first = chain_hash(ZERO_HASH, core);
        let second = chain_hash(&first, core);
        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
        // deterministic
        assert_eq!(chain_hash(ZERO_HASH, core), first);
    }
}
