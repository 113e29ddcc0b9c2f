use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::db::now_timestamp;
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, CurrentUser};
use crate::profile::repository as profiles;
use crate::profile::{ProfileFields, ProfileInput};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/baby-profiles", post(create))
        .route("/api/baby-profiles/me", get(me))
        .route(
            "/api/baby-profiles/{document_id}",
            get(find_one).put(update).delete(delete),
        )
}

/// GET /api/baby-profiles/me
async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Value>> {
    let list = profiles::list_for_user(&state.db, &user.id)?;
    Ok(Json(json!({
        "data": list,
        "meta": { "count": list.len() }
    })))
}

/// POST /api/baby-profiles
async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<ProfileInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let fields = ProfileFields::from_create(input).map_err(AppError::BadRequest)?;
    let profile = profiles::insert(&state.db, &user.id, &fields)?;

    tracing::info!(user_id = %user.id, profile = %profile.document_id, "Baby profile created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": profile,
            "meta": { "createdAt": profile.created_at }
        })),
    ))
}

/// GET /api/baby-profiles/{document_id}
async fn find_one(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<String>,
) -> AppResult<Json<Value>> {
    let profile = profiles::find_owned(
        &state.db,
        &document_id,
        &user.id,
        "You are not authorized to view this profile",
    )?;
    Ok(Json(json!({ "data": profile })))
}

/// PUT /api/baby-profiles/{document_id}
async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<String>,
    AppJson(patch): AppJson<ProfileInput>,
) -> AppResult<Json<Value>> {
    let existing = profiles::find_owned(
        &state.db,
        &document_id,
        &user.id,
        "You are not authorized to update this profile",
    )?;
    let fields = ProfileFields::merge(&existing, patch).map_err(AppError::BadRequest)?;
    let profile = profiles::update(&state.db, &document_id, &fields)?;

    tracing::info!(user_id = %user.id, profile = %document_id, "Baby profile updated");
    Ok(Json(json!({
        "data": profile,
        "meta": { "updatedAt": profile.updated_at }
    })))
}

/// DELETE /api/baby-profiles/{document_id}
async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<String>,
) -> AppResult<Json<Value>> {
    let profile = profiles::find_owned(
        &state.db,
        &document_id,
        &user.id,
        "You are not authorized to delete this profile",
    )?;
    let activities_deleted = profiles::delete_with_activities(&state.db, &profile)?;

    tracing::info!(
        user_id = %user.id,
        profile = %document_id,
        activities_deleted,
        "Baby profile deleted"
    );
    Ok(Json(json!({
        "data": null,
        "meta": {
            "deletedAt": now_timestamp(),
            "activitiesDeleted": activities_deleted,
        }
    })))
}
