//! Database pool and schema
//!
//! Pool construction mirrors the configured min/max sizes; the schema
//! initializer is idempotent and also creates the audit table via the
//! audit crate so a fresh database is fully usable after startup.

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{ApiError, ApiResult};
use crate::models::Layout;
use crate::settings::MgmtSettings;

/// Entity tables. Audit lives in `wallgrid_audit::store::SCHEMA_SQL`.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS walls (
  id          SERIAL PRIMARY KEY,
  name        TEXT NOT NULL,
  wall_type   TEXT NOT NULL,
  tile_count  INTEGER NOT NULL,
  resolution  TEXT NOT NULL,
  tags        TEXT[] NOT NULL DEFAULT ARRAY[]::TEXT[],
  created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS sources (
  id            SERIAL PRIMARY KEY,
  name          TEXT NOT NULL,
  source_type   TEXT NOT NULL,
  protocol      TEXT NOT NULL,
  endpoint_url  TEXT NOT NULL,
  codec         TEXT NOT NULL,
  tags          TEXT[] NOT NULL DEFAULT ARRAY[]::TEXT[],
  health_status TEXT NOT NULL DEFAULT 'unknown',
  created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
  updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS layouts (
  id          SERIAL PRIMARY KEY,
  wall_id     INTEGER NOT NULL REFERENCES walls(id) ON DELETE CASCADE,
  name        TEXT NOT NULL,
  version     INTEGER NOT NULL,
  grid_config JSONB NOT NULL,
  preset_name TEXT NOT NULL DEFAULT '',
  is_active   BOOLEAN NOT NULL DEFAULT FALSE,
  created_by  TEXT NOT NULL,
  created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_layouts_wall_id ON layouts(wall_id);
CREATE INDEX IF NOT EXISTS idx_layouts_active ON layouts(wall_id, is_active);
CREATE UNIQUE INDEX IF NOT EXISTS idx_layouts_wall_version ON layouts(wall_id, version);

CREATE TABLE IF NOT EXISTS source_health (
  source_id   INTEGER PRIMARY KEY REFERENCES sources(id) ON DELETE CASCADE,
  last_seen   TIMESTAMPTZ NOT NULL,
  status      TEXT NOT NULL,
  details     JSONB NOT NULL DEFAULT '{}'::jsonb
);

CREATE TABLE IF NOT EXISTS wall_health (
  wall_id     INTEGER PRIMARY KEY REFERENCES walls(id) ON DELETE CASCADE,
  last_seen   TIMESTAMPTZ NOT NULL,
  status      TEXT NOT NULL,
  details     JSONB NOT NULL DEFAULT '{}'::jsonb
);
"#;

/// Create the connection pool.
#[instrument(level = "debug", skip(settings))]
pub async fn init_pool(settings: &MgmtSettings) -> ApiResult<PgPool> {
    debug!("🔧 Creating database connection pool");
    let pool = PgPoolOptions::new()
        .min_connections(settings.db_min_size)
        .max_connections(settings.db_max_size)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&settings.db_dsn)
        .await
        .map_err(|e| ApiError::Internal(format!("database_error:{e}")))?;
    info!(
        "✅ Created database connection pool with {} max connections",
        settings.db_max_size
    );
    Ok(pool)
}

/// Create all tables and indexes if missing.
#[instrument(level = "debug", skip(pool))]
pub async fn init_schema(pool: &PgPool) -> ApiResult<()> {
    debug!("🔧 Initializing management schema");
    for stmt in SCHEMA_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(stmt).execute(pool).await?;
    }
    wallgrid_audit::store::init_schema(pool)
        .await
        .map_err(|e| ApiError::Internal(format!("audit_error:{e}")))?;
    info!("✅ Management schema ready");
    Ok(())
}

/// Close the pool on shutdown.
pub async fn close_pool(pool: &PgPool) {
    pool.close().await;
    info!("🛑 Database connection pool closed");
}

/// Next layout version for a wall: `MAX(version) + 1`, gap-free from 1.
/// Call inside the same transaction as the insert.
pub async fn next_layout_version(conn: &mut PgConnection, wall_id: i32) -> ApiResult<i32> {
    let current: Option<i32> =
        sqlx::query_scalar("SELECT MAX(version) FROM layouts WHERE wall_id=$1")
            .bind(wall_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(current.unwrap_or(0) + 1)
}

/// Atomically make `layout_id` the only active layout of its wall.
pub async fn activate_layout(conn: &mut PgConnection, layout_id: i32) -> ApiResult<Layout> {
    let wall_id: Option<i32> = sqlx::query_scalar("SELECT wall_id FROM layouts WHERE id=$1")
        .bind(layout_id)
        .fetch_optional(&mut *conn)
        .await?;
    let wall_id = wall_id.ok_or_else(|| ApiError::NotFound("layout_not_found".to_string()))?;

    sqlx::query("UPDATE layouts SET is_active=FALSE WHERE wall_id=$1 AND id<>$2")
        .bind(wall_id)
        .bind(layout_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE layouts SET is_active=TRUE WHERE id=$1")
        .bind(layout_id)
        .execute(&mut *conn)
        .await?;

    let layout = sqlx::query_as::<_, Layout>(
        "SELECT id, wall_id, name, version, grid_config, preset_name, is_active, created_by, created_at \
         FROM layouts WHERE id=$1",
    )
    .bind(layout_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(layout)
}
