//! Source CRUD
//!
//! Reads need `viewer`, create/update `operator`, delete `admin`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use wallgrid_audit::chain::append_event_tx;
use wallgrid_audit::NewEvent;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{Source, SourceIn};
use crate::state::AppState;

const SELECT_FIELDS: &str =
    "id, name, source_type, protocol, endpoint_url, codec, tags, health_status";

pub async fn list_sources(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Source>>> {
    user.require_role(&["viewer", "operator"])?;
    let sources = sqlx::query_as::<_, Source>(&format!(
        "SELECT {SELECT_FIELDS} FROM sources ORDER BY id"
    ))
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(sources))
}

pub async fn create_source(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SourceIn>,
) -> ApiResult<(StatusCode, Json<Source>)> {
    user.require_role(&["operator"])?;
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let source = sqlx::query_as::<_, Source>(&format!(
        "INSERT INTO sources (name, source_type, protocol, endpoint_url, codec, tags, health_status) \
         VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING {SELECT_FIELDS}"
    ))
    .bind(&payload.name)
    .bind(&payload.source_type)
    .bind(&payload.protocol)
    .bind(&payload.endpoint_url)
    .bind(&payload.codec)
    .bind(&payload.tags)
    .bind(&payload.health_status)
    .fetch_one(&mut *tx)
    .await?;

    append_event_tx(
        &mut tx,
        state.chain_id(),
        NewEvent::new(
            "sources.create",
            user.actor(),
            "source",
            source.id.to_string(),
            serde_json::to_value(&source)?,
        ),
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(source)))
}

pub async fn get_source(
    State(state): State<AppState>,
    user: AuthUser,
    Path(source_id): Path<i32>,
) -> ApiResult<Json<Source>> {
    user.require_role(&["viewer", "operator"])?;
    let source = sqlx::query_as::<_, Source>(&format!(
        "SELECT {SELECT_FIELDS} FROM sources WHERE id=$1"
    ))
    .bind(source_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("source_not_found".into()))?;
    Ok(Json(source))
}

pub async fn update_source(
    State(state): State<AppState>,
    user: AuthUser,
    Path(source_id): Path<i32>,
    Json(payload): Json<SourceIn>,
) -> ApiResult<Json<Source>> {
    user.require_role(&["operator"])?;
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let source = sqlx::query_as::<_, Source>(&format!(
        "UPDATE sources \
         SET name=$2, source_type=$3, protocol=$4, endpoint_url=$5, codec=$6, tags=$7, health_status=$8, updated_at=NOW() \
         WHERE id=$1 RETURNING {SELECT_FIELDS}"
    ))
    .bind(source_id)
    .bind(&payload.name)
    .bind(&payload.source_type)
    .bind(&payload.protocol)
    .bind(&payload.endpoint_url)
    .bind(&payload.codec)
    .bind(&payload.tags)
    .bind(&payload.health_status)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::NotFound("source_not_found".into()))?;

    append_event_tx(
        &mut tx,
        state.chain_id(),
        NewEvent::new(
            "sources.update",
            user.actor(),
            "source",
            source.id.to_string(),
            serde_json::to_value(&source)?,
        ),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(source))
}

pub async fn delete_source(
    State(state): State<AppState>,
    user: AuthUser,
    Path(source_id): Path<i32>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;

    let mut tx = state.pool.begin().await?;
    let deleted: Option<i32> = sqlx::query_scalar("DELETE FROM sources WHERE id=$1 RETURNING id")
        .bind(source_id)
        .fetch_optional(&mut *tx)
        .await?;
    if deleted.is_none() {
        return Err(ApiError::NotFound("source_not_found".into()));
    }

    append_event_tx(
        &mut tx,
        state.chain_id(),
        NewEvent::new(
            "sources.delete",
            user.actor(),
            "source",
            source_id.to_string(),
            json!({}),
        ),
    )
    .await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
