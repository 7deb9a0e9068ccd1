//! Layout CRUD and activation
//!
//! Versions within a wall are assigned `MAX(version)+1` under the insert
//! transaction; a unique index on `(wall_id, version)` turns a version
//! race into a 409 the caller resolves by retrying. Activation and the
//! deactivation of any previously active layout commit together, so at
//! most one layout per wall is ever active at a commit boundary.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use wallgrid_audit::chain::append_event_tx;
use wallgrid_audit::NewEvent;

use crate::auth::AuthUser;
use crate::db::{activate_layout, next_layout_version};
use crate::error::{ApiError, ApiResult};
use crate::models::{Layout, LayoutIn};
use crate::state::AppState;

const SELECT_FIELDS: &str =
    "id, wall_id, name, version, grid_config, preset_name, is_active, created_by, created_at";

pub async fn list_layouts(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Layout>>> {
    user.require_role(&["viewer", "operator"])?;
    let layouts = sqlx::query_as::<_, Layout>(&format!(
        "SELECT {SELECT_FIELDS} FROM layouts ORDER BY wall_id, version DESC"
    ))
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(layouts))
}

pub async fn create_layout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<LayoutIn>,
) -> ApiResult<(StatusCode, Json<Layout>)> {
    user.require_role(&["operator"])?;
    let actor = user.actor();

    let mut tx = state.pool.begin().await?;
    let version = next_layout_version(&mut tx, payload.wall_id).await?;
    let layout = sqlx::query_as::<_, Layout>(&format!(
        "INSERT INTO layouts (wall_id, name, version, grid_config, preset_name, is_active, created_by) \
         VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING {SELECT_FIELDS}"
    ))
    .bind(payload.wall_id)
    .bind(&payload.name)
    .bind(version)
    .bind(&payload.grid_config)
    .bind(&payload.preset_name)
    .bind(payload.is_active)
    .bind(&actor)
    .fetch_one(&mut *tx)
    .await?;

    if payload.is_active {
        sqlx::query("UPDATE layouts SET is_active=FALSE WHERE wall_id=$1 AND id<>$2")
            .bind(payload.wall_id)
            .bind(layout.id)
            .execute(&mut *tx)
            .await?;
    }

    append_event_tx(
        &mut tx,
        state.chain_id(),
        NewEvent::new(
            "layouts.create",
            actor,
            "layout",
            layout.id.to_string(),
            serde_json::to_value(&layout)?,
        ),
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(layout)))
}

pub async fn get_layout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(layout_id): Path<i32>,
) -> ApiResult<Json<Layout>> {
    user.require_role(&["viewer", "operator"])?;
    let layout = sqlx::query_as::<_, Layout>(&format!(
        "SELECT {SELECT_FIELDS} FROM layouts WHERE id=$1"
    ))
    .bind(layout_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("layout_not_found".into()))?;
    Ok(Json(layout))
}

pub async fn update_layout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(layout_id): Path<i32>,
    Json(payload): Json<LayoutIn>,
) -> ApiResult<Json<Layout>> {
    user.require_role(&["operator"])?;

    let mut tx = state.pool.begin().await?;
    // version, creator, and creation time are immutable
    let layout = sqlx::query_as::<_, Layout>(&format!(
        "UPDATE layouts SET wall_id=$2, name=$3, grid_config=$4, preset_name=$5, is_active=$6 \
         WHERE id=$1 RETURNING {SELECT_FIELDS}"
    ))
    .bind(layout_id)
    .bind(payload.wall_id)
    .bind(&payload.name)
    .bind(&payload.grid_config)
    .bind(&payload.preset_name)
    .bind(payload.is_active)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::NotFound("layout_not_found".into()))?;

    if payload.is_active {
        sqlx::query("UPDATE layouts SET is_active=FALSE WHERE wall_id=$1 AND id<>$2")
            .bind(payload.wall_id)
            .bind(layout_id)
            .execute(&mut *tx)
            .await?;
    }

    append_event_tx(
        &mut tx,
        state.chain_id(),
        NewEvent::new(
            "layouts.update",
            user.actor(),
            "layout",
            layout.id.to_string(),
            serde_json::to_value(&layout)?,
        ),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(layout))
}

pub async fn delete_layout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(layout_id): Path<i32>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;

    let mut tx = state.pool.begin().await?;
    let deleted: Option<i32> = sqlx::query_scalar("DELETE FROM layouts WHERE id=$1 RETURNING id")
        .bind(layout_id)
        .fetch_optional(&mut *tx)
        .await?;
    if deleted.is_none() {
        return Err(ApiError::NotFound("layout_not_found".into()));
    }

    append_event_tx(
        &mut tx,
        state.chain_id(),
        NewEvent::new(
            "layouts.delete",
            user.actor(),
            "layout",
            layout_id.to_string(),
            json!({}),
        ),
    )
    .await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(layout_id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(&["operator"])?;

    let mut tx = state.pool.begin().await?;
    let layout = activate_layout(&mut tx, layout_id).await?;
    append_event_tx(
        &mut tx,
        state.chain_id(),
        NewEvent::new(
            "layouts.activate",
            user.actor(),
            "layout",
            layout_id.to_string(),
            serde_json::to_value(&layout)?,
        ),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(json!({"activated": true, "layout": layout})))
}
