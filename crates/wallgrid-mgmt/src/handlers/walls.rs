//! Wall CRUD
//!
//! Reads need `viewer`; every write is `admin`. Each write commits the
//! entity change and its audit event in one transaction.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use wallgrid_audit::chain::append_event_tx;
use wallgrid_audit::NewEvent;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{Wall, WallIn};
use crate::state::AppState;

const SELECT_FIELDS: &str = "id, name, wall_type, tile_count, resolution, tags";

pub async fn list_walls(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Wall>>> {
    user.require_role(&["viewer", "operator"])?;
    let walls = sqlx::query_as::<_, Wall>(&format!(
        "SELECT {SELECT_FIELDS} FROM walls ORDER BY id"
    ))
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(walls))
}

pub async fn create_wall(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<WallIn>,
) -> ApiResult<(StatusCode, Json<Wall>)> {
    user.require_admin()?;
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let wall = sqlx::query_as::<_, Wall>(&format!(
        "INSERT INTO walls (name, wall_type, tile_count, resolution, tags) \
         VALUES ($1,$2,$3,$4,$5) RETURNING {SELECT_FIELDS}"
    ))
    .bind(&payload.name)
    .bind(&payload.wall_type)
    .bind(payload.tile_count)
    .bind(&payload.resolution)
    .bind(&payload.tags)
    .fetch_one(&mut *tx)
    .await?;

    append_event_tx(
        &mut tx,
        state.chain_id(),
        NewEvent::new(
            "walls.create",
            user.actor(),
            "wall",
            wall.id.to_string(),
            serde_json::to_value(&wall)?,
        ),
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(wall)))
}

pub async fn get_wall(
    State(state): State<AppState>,
    user: AuthUser,
    Path(wall_id): Path<i32>,
) -> ApiResult<Json<Wall>> {
    user.require_role(&["viewer", "operator"])?;
    let wall = sqlx::query_as::<_, Wall>(&format!(
        "SELECT {SELECT_FIELDS} FROM walls WHERE id=$1"
    ))
    .bind(wall_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("wall_not_found".into()))?;
    Ok(Json(wall))
}

pub async fn update_wall(
    State(state): State<AppState>,
    user: AuthUser,
    Path(wall_id): Path<i32>,
    Json(payload): Json<WallIn>,
) -> ApiResult<Json<Wall>> {
    user.require_admin()?;
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    let wall = sqlx::query_as::<_, Wall>(&format!(
        "UPDATE walls SET name=$2, wall_type=$3, tile_count=$4, resolution=$5, tags=$6, updated_at=NOW() \
         WHERE id=$1 RETURNING {SELECT_FIELDS}"
    ))
    .bind(wall_id)
    .bind(&payload.name)
    .bind(&payload.wall_type)
    .bind(payload.tile_count)
    .bind(&payload.resolution)
    .bind(&payload.tags)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::NotFound("wall_not_found".into()))?;

    append_event_tx(
        &mut tx,
        state.chain_id(),
        NewEvent::new(
            "walls.update",
            user.actor(),
            "wall",
            wall.id.to_string(),
            serde_json::to_value(&wall)?,
        ),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(wall))
}

pub async fn delete_wall(
    State(state): State<AppState>,
    user: AuthUser,
    Path(wall_id): Path<i32>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;

    let mut tx = state.pool.begin().await?;
    let deleted: Option<i32> = sqlx::query_scalar("DELETE FROM walls WHERE id=$1 RETURNING id")
        .bind(wall_id)
        .fetch_optional(&mut *tx)
        .await?;
    if deleted.is_none() {
        return Err(ApiError::NotFound("wall_not_found".into()));
    }

    append_event_tx(
        &mut tx,
        state.chain_id(),
        NewEvent::new("walls.delete", user.actor(), "wall", wall_id.to_string(), json!({})),
    )
    .await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
