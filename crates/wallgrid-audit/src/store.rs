//! Audit event storage
//!
//! Schema DDL and fetch helpers over the `audit_events` table. The table
//! is shared with the management service; rows are partitioned logically
//! by `chain_id`.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder};
use tracing::{debug, info, instrument};

use crate::chain::AuditEvent;
use crate::error::Result;

/// Audit schema DDL, idempotent.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS audit_events (
  id          BIGSERIAL PRIMARY KEY,
  ts          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  chain_id    TEXT NOT NULL,
  action      TEXT NOT NULL,
  actor       TEXT NOT NULL,
  object_type TEXT NOT NULL,
  object_id   TEXT NOT NULL,
  details     JSONB NOT NULL,
  prev_hash   TEXT NOT NULL,
  hash        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_action ON audit_events(action);
CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_events(actor);
CREATE INDEX IF NOT EXISTS idx_audit_ts ON audit_events(ts);
"#;

/// Create the audit table and indexes if missing.
#[instrument(level = "debug", skip(pool))]
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    debug!("🔧 Initializing audit schema");
    for stmt in SCHEMA_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(stmt).execute(pool).await?;
    }
    info!("✅ Audit schema ready");
    Ok(())
}

/// Filters for event queries. `None` fields are not constrained.
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    pub action: Option<String>,
    pub actor: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: i64,
}

/// Fetch events newest-first, constrained by the filter.
pub async fn query_events(
    pool: &PgPool,
    chain_id: &str,
    filter: &EventFilter,
) -> Result<Vec<AuditEvent>> {
    let mut qb = QueryBuilder::new(
        "SELECT id, ts, chain_id, action, actor, object_type, object_id, details, prev_hash, hash \
         FROM audit_events WHERE chain_id = ",
    );
    qb.push_bind(chain_id);
    if let Some(action) = &filter.action {
        qb.push(" AND action = ").push_bind(action);
    }
    if let Some(actor) = &filter.actor {
        qb.push(" AND actor = ").push_bind(actor);
    }
    if let Some(since) = filter.since {
        qb.push(" AND ts >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        qb.push(" AND ts <= ").push_bind(until);
    }
    qb.push(" ORDER BY id DESC LIMIT ").push_bind(filter.limit.clamp(1, 1000));

    let events = qb.build_query_as::<AuditEvent>().fetch_all(pool).await?;
    Ok(events)
}

/// Fetch the last `n` events of a chain in forward (oldest-first) order.
pub async fn fetch_last_n(pool: &PgPool, chain_id: &str, n: i64) -> Result<Vec<AuditEvent>> {
    let mut events = sqlx::query_as::<_, AuditEvent>(
        "SELECT id, ts, chain_id, action, actor, object_type, object_id, details, prev_hash, hash \
         FROM audit_events WHERE chain_id=$1 ORDER BY id DESC LIMIT $2",
    )
    .bind(chain_id)
    .bind(n)
    .fetch_all(pool)
    .await?;
    events.reverse();
    Ok(events)
}
