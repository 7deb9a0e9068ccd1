//! Config reconciliation
//!
//! Converges relational state toward the Configuration Authority's
//! declarative snapshot. Reconciliation is additive: rows are linked to
//! YAML entities solely by the `config:<id>` marker tag, rows without a
//! marker are operator-owned and never touched, and removal of an entity
//! from the YAML never deletes its row.

use metrics::counter;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use wallgrid_audit::chain::append_event_tx;
use wallgrid_audit::NewEvent;

use crate::error::ApiResult;
use crate::settings::MgmtSettings;

/// Actor recorded on reconciler-generated audit events.
pub const RECONCILER_ACTOR: &str = "config-reconciler";

/// Marker tag linking a DB row to a declarative config id.
pub fn config_tag(config_id: &str) -> String {
    format!("config:{config_id}")
}

fn map_wall_type(kind: &str) -> &'static str {
    match kind {
        "bigscreen" => "bigscreen",
        _ => "tilewall",
    }
}

fn map_source_type(kind: &str) -> &'static str {
    match kind {
        "webrtc" => "vdi",
        _ => "hdmi",
    }
}

fn map_protocol(kind: &str) -> &'static str {
    match kind {
        "webrtc" => "webrtc",
        "srt" => "srt",
        "rtsp" => "rtsp",
        "rtp" => "rtp",
        _ => "other",
    }
}

/// Tags as stored: `k:v` pairs from the YAML mapping (or a plain list),
/// plus the marker, sorted and deduplicated.
fn tag_list(raw: Option<&Value>, config_id: &str) -> Vec<String> {
    let mut tags = BTreeSet::new();
    match raw {
        Some(Value::Object(map)) => {
            for (k, v) in map {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                tags.insert(format!("{k}:{v}"));
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(s) => tags.insert(s.clone()),
                    other => tags.insert(other.to_string()),
                };
            }
        }
        _ => {}
    }
    tags.insert(config_tag(config_id));
    tags.into_iter().collect()
}

/// Proposed wall row derived from a config entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WallFields {
    pub name: String,
    pub wall_type: String,
    pub tile_count: i32,
    pub resolution: String,
    pub tags: Vec<String>,
}

/// Map a Configuration Authority wall to its database field set.
pub fn wall_to_db(wall: &Value) -> Option<WallFields> {
    let id = wall.get("id")?.as_str()?;
    let kind = wall.get("type").and_then(Value::as_str).unwrap_or("tiles");

    let tile_count = match wall.get("grid").filter(|g| g.is_object()) {
        Some(grid) => {
            let rows = grid.get("rows").and_then(Value::as_i64).unwrap_or(1);
            let cols = grid.get("cols").and_then(Value::as_i64).unwrap_or(1);
            rows * cols
        }
        None => wall.get("screens").and_then(Value::as_i64).unwrap_or(1),
    };

    Some(WallFields {
        name: id.to_string(),
        wall_type: map_wall_type(kind).to_string(),
        tile_count: tile_count as i32,
        resolution: wall
            .get("resolution")
            .and_then(Value::as_str)
            .unwrap_or("1920x1080")
            .to_string(),
        tags: tag_list(wall.get("tags"), id),
    })
}

/// Proposed source row derived from a config entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFields {
    pub name: String,
    pub source_type: String,
    pub protocol: String,
    pub endpoint_url: String,
    pub codec: String,
    pub tags: Vec<String>,
}

/// Map a Configuration Authority source to its database field set.
pub fn source_to_db(source: &Value) -> Option<SourceFields> {
    let id = source.get("id")?.as_str()?;
    let kind = source.get("type").and_then(Value::as_str).unwrap_or("srt");

    Some(SourceFields {
        name: id.to_string(),
        source_type: map_source_type(kind).to_string(),
        protocol: map_protocol(kind).to_string(),
        endpoint_url: source
            .get("endpoint")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        codec: source
            .get("codec")
            .and_then(Value::as_str)
            .unwrap_or("h264")
            .to_string(),
        tags: tag_list(source.get("tags"), id),
    })
}

/// Pass statistics per entity kind
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct PassStats {
    pub created: u32,
    pub updated: u32,
}

// ── Fetching from the Configuration Authority ────────────────────────────

/// Current config hash, or `None` when the authority is unreachable.
pub async fn fetch_config_version(client: &reqwest::Client, config_url: &str) -> Option<String> {
    let url = format!("{config_url}/api/v1/config/version");
    let result = async {
        let response = client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        Ok::<_, reqwest::Error>(
            body.get("config_hash")
                .and_then(Value::as_str)
                .map(str::to_string),
        )
    }
    .await;

    match result {
        Ok(hash) => hash,
        Err(err) => {
            warn!("⚠️ Configuration Authority unreachable for version check: {}", err);
            None
        }
    }
}

async fn fetch_entities(
    client: &reqwest::Client,
    config_url: &str,
    section: &str,
) -> Result<Vec<Value>, reqwest::Error> {
    let url = format!("{config_url}/api/v1/{section}");
    let body: Value = client
        .get(&url)
        .timeout(Duration::from_secs(10))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(body
        .get(section)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

// ── Upsert passes ────────────────────────────────────────────────────────

async fn reconcile_walls(
    pool: &PgPool,
    chain_id: &str,
    config_walls: &[Value],
) -> ApiResult<PassStats> {
    let mut stats = PassStats::default();

    for config_wall in config_walls {
        let Some(proposed) = wall_to_db(config_wall) else {
            continue;
        };
        let config_id = config_wall
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let marker = config_tag(config_id);

        let mut tx = pool.begin().await?;
        let existing: Option<(i32, WallFields)> = sqlx::query_as::<_, WallRow>(
            "SELECT id, name, wall_type, tile_count, resolution, tags FROM walls WHERE $1 = ANY(tags)",
        )
        .bind(&marker)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| (row.id, row.into_fields()));

        match existing {
            None => {
                let wall_id: i32 = sqlx::query_scalar(
                    "INSERT INTO walls (name, wall_type, tile_count, resolution, tags) \
                     VALUES ($1,$2,$3,$4,$5) RETURNING id",
                )
                .bind(&proposed.name)
                .bind(&proposed.wall_type)
                .bind(proposed.tile_count)
                .bind(&proposed.resolution)
                .bind(&proposed.tags)
                .fetch_one(&mut *tx)
                .await?;

                let mut details = serde_json::to_value(&proposed)?;
                details["config_id"] = json!(config_id);
                append_event_tx(
                    &mut tx,
                    chain_id,
                    NewEvent::new(
                        "config.reconcile.wall.create",
                        RECONCILER_ACTOR,
                        "wall",
                        wall_id.to_string(),
                        details,
                    ),
                )
                .await?;
                tx.commit().await?;
                stats.created += 1;
            }
            Some((wall_id, mut current)) => {
                current.tags.sort();
                if current == proposed {
                    tx.commit().await?;
                    continue;
                }

                sqlx::query(
                    "UPDATE walls SET name=$2, wall_type=$3, tile_count=$4, resolution=$5, tags=$6, updated_at=NOW() \
                     WHERE id=$1",
                )
                .bind(wall_id)
                .bind(&proposed.name)
                .bind(&proposed.wall_type)
                .bind(proposed.tile_count)
                .bind(&proposed.resolution)
                .bind(&proposed.tags)
                .execute(&mut *tx)
                .await?;

                append_event_tx(
                    &mut tx,
                    chain_id,
                    NewEvent::new(
                        "config.reconcile.wall.update",
                        RECONCILER_ACTOR,
                        "wall",
                        wall_id.to_string(),
                        json!({
                            "config_id": config_id,
                            "before": current,
                            "after": proposed,
                        }),
                    ),
                )
                .await?;
                tx.commit().await?;
                stats.updated += 1;
            }
        }
    }

    Ok(stats)
}

#[derive(sqlx::FromRow)]
struct WallRow {
    id: i32,
    name: String,
    wall_type: String,
    tile_count: i32,
    resolution: String,
    tags: Vec<String>,
}

impl WallRow {
    fn into_fields(self) -> WallFields {
        WallFields {
            name: self.name,
            wall_type: self.wall_type,
            tile_count: self.tile_count,
            resolution: self.resolution,
            tags: self.tags,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SourceRow {
    id: i32,
    name: String,
    source_type: String,
    protocol: String,
    endpoint_url: String,
    codec: String,
    tags: Vec<String>,
}

impl SourceRow {
    fn into_fields(self) -> SourceFields {
        SourceFields {
            name: self.name,
            source_type: self.source_type,
            protocol: self.protocol,
            endpoint_url: self.endpoint_url,
            codec: self.codec,
            tags: self.tags,
        }
    }
}

async fn reconcile_sources(
    pool: &PgPool,
    chain_id: &str,
    config_sources: &[Value],
) -> ApiResult<PassStats> {
    let mut stats = PassStats::default();

    for config_source in config_sources {
        let Some(proposed) = source_to_db(config_source) else {
            continue;
        };
        let config_id = config_source
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let marker = config_tag(config_id);

        let mut tx = pool.begin().await?;
        let existing: Option<(i32, SourceFields)> = sqlx::query_as::<_, SourceRow>(
            "SELECT id, name, source_type, protocol, endpoint_url, codec, tags FROM sources WHERE $1 = ANY(tags)",
        )
        .bind(&marker)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| (row.id, row.into_fields()));

        match existing {
            None => {
                let source_id: i32 = sqlx::query_scalar(
                    "INSERT INTO sources (name, source_type, protocol, endpoint_url, codec, tags, health_status) \
                     VALUES ($1,$2,$3,$4,$5,$6,'unknown') RETURNING id",
                )
                .bind(&proposed.name)
                .bind(&proposed.source_type)
                .bind(&proposed.protocol)
                .bind(&proposed.endpoint_url)
                .bind(&proposed.codec)
                .bind(&proposed.tags)
                .fetch_one(&mut *tx)
                .await?;

                let mut details = serde_json::to_value(&proposed)?;
                details["config_id"] = json!(config_id);
                append_event_tx(
                    &mut tx,
                    chain_id,
                    NewEvent::new(
                        "config.reconcile.source.create",
                        RECONCILER_ACTOR,
                        "source",
                        source_id.to_string(),
                        details,
                    ),
                )
                .await?;
                tx.commit().await?;
                stats.created += 1;
            }
            Some((source_id, mut current)) => {
                current.tags.sort();
                if current == proposed {
                    tx.commit().await?;
                    continue;
                }

                sqlx::query(
                    "UPDATE sources SET name=$2, source_type=$3, protocol=$4, endpoint_url=$5, codec=$6, tags=$7, updated_at=NOW() \
                     WHERE id=$1",
                )
                .bind(source_id)
                .bind(&proposed.name)
                .bind(&proposed.source_type)
                .bind(&proposed.protocol)
                .bind(&proposed.endpoint_url)
                .bind(&proposed.codec)
                .bind(&proposed.tags)
                .execute(&mut *tx)
                .await?;

                append_event_tx(
                    &mut tx,
                    chain_id,
                    NewEvent::new(
                        "config.reconcile.source.update",
                        RECONCILER_ACTOR,
                        "source",
                        source_id.to_string(),
                        json!({
                            "config_id": config_id,
                            "before": current,
                            "after": proposed,
                        }),
                    ),
                )
                .await?;
                tx.commit().await?;
                stats.updated += 1;
            }
        }
    }

    Ok(stats)
}

// ── Public entry points ──────────────────────────────────────────────────

/// Run one reconciliation pass. Returns a summary of applied changes, or
/// `{"error": ...}` when the authority could not be fetched.
#[instrument(level = "debug", skip(pool, client, settings))]
pub async fn reconcile_once(
    pool: &PgPool,
    client: &reqwest::Client,
    settings: &MgmtSettings,
) -> ApiResult<Value> {
    let walls = match fetch_entities(client, &settings.config_url, "walls").await {
        Ok(walls) => walls,
        Err(err) => {
            warn!("⚠️ Failed to fetch walls from Configuration Authority: {}", err);
            return Ok(json!({"error": err.to_string()}));
        }
    };
    let sources = match fetch_entities(client, &settings.config_url, "sources").await {
        Ok(sources) => sources,
        Err(err) => {
            warn!("⚠️ Failed to fetch sources from Configuration Authority: {}", err);
            return Ok(json!({"error": err.to_string()}));
        }
    };

    let wall_stats = reconcile_walls(pool, &settings.audit_chain_id, &walls).await?;
    let source_stats = reconcile_sources(pool, &settings.audit_chain_id, &sources).await?;

    let total =
        wall_stats.created + wall_stats.updated + source_stats.created + source_stats.updated;
    counter!("reconcile.changes").increment(u64::from(total));
    if total > 0 {
        info!(
            "✅ Reconciliation applied {} changes (walls {}+{}, sources {}+{})",
            total, wall_stats.created, wall_stats.updated, source_stats.created, source_stats.updated
        );
    } else {
        debug!("Reconciliation: no changes");
    }

    Ok(json!({
        "walls": wall_stats,
        "sources": source_stats,
        "config_walls": walls.len(),
        "config_sources": sources.len(),
    }))
}

/// Background loop: poll the authority's config hash, reconcile on change.
/// An unreachable authority or a fetch timeout counts as "unchanged".
pub async fn reconcile_loop(pool: PgPool, client: reqwest::Client, settings: MgmtSettings) {
    if !settings.reconcile_enabled {
        info!("Config reconciliation disabled (reconcile_enabled=false)");
        return;
    }
    info!(
        "⏰ Config reconciliation started (interval={}s, url={})",
        settings.reconcile_interval_s, settings.config_url
    );

    // give the authority a moment to come up
    tokio::time::sleep(Duration::from_secs(2)).await;

    let mut last_hash = fetch_config_version(&client, &settings.config_url).await;
    if last_hash.is_some() {
        if let Err(err) = reconcile_once(&pool, &client, &settings).await {
            warn!("⚠️ Initial reconciliation failed (will retry): {}", err);
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(settings.reconcile_interval_s));
    ticker.tick().await; // skip immediate first tick
    loop {
        ticker.tick().await;
        let Some(current_hash) = fetch_config_version(&client, &settings.config_url).await else {
            continue; // unreachable: skip the pass, retry next interval
        };
        if Some(&current_hash) != last_hash.as_ref() {
            info!(
                "🔄 Config hash changed ({:?} -> {}), reconciling...",
                last_hash, current_hash
            );
            if let Err(err) = reconcile_once(&pool, &client, &settings).await {
                warn!("⚠️ Reconciliation pass failed: {}", err);
                continue;
            }
            last_hash = Some(current_hash);
        }
    }
}
