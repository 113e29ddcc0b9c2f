use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::activity::domain::{
    validate_batch, ListFilter, PullWindow, MAX_BULK_DELETE, MAX_PUSH_BATCH,
};
use crate::db::models::ActivityRecord;
use crate::db::{normalize_timestamp, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, CurrentUser};
use crate::profile::repository as profiles;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/baby-activities", get(list))
        .route("/api/baby-activities/sync", get(pull).post(push))
        .route("/api/baby-activities/bulk-delete", post(bulk_delete))
        .route(
            "/api/baby-activities/{document_id}",
            get(find_one).delete(delete_one),
        )
}

fn required_profile_id(raw: Option<&str>) -> AppResult<&str> {
    raw.map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("baby_profile_id is required".into()))
}

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    pub baby_profile_id: Option<String>,
    pub since: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// GET /api/baby-activities/sync
async fn pull(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PullQuery>,
) -> AppResult<Json<Value>> {
    let profile_id = required_profile_id(query.baby_profile_id.as_deref())?;
    let profile = profiles::find_owned(
        &state.db,
        profile_id,
        &user.id,
        "You are not authorized to access this baby profile",
    )?;

    let since = match query.since.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(normalize_timestamp(raw).ok_or_else(|| {
            AppError::BadRequest("Invalid since timestamp format. Use ISO format.".into())
        })?),
    };
    let window = PullWindow::parse(query.limit.as_deref(), query.offset.as_deref());

    let page = state
        .activities
        .pull(&user.id, profile.id, since.as_deref(), window)
        .await?;

    tracing::debug!(
        user_id = %user.id,
        profile = %profile.document_id,
        since = ?since,
        returned = page.records.len(),
        "Sync pull"
    );

    let has_more = page.has_more(window);
    Ok(Json(json!({
        "data": page.records,
        "meta": {
            "pagination": {
                "offset": window.offset,
                "limit": window.limit,
                "total": page.total,
                "hasMore": has_more,
            },
            "serverTime": page.server_time,
            "lastSyncedAt": page.server_time,
        }
    })))
}

/// POST /api/baby-activities/sync
async fn push(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(body): AppJson<Value>,
) -> AppResult<Json<Value>> {
    let profile_id = required_profile_id(body.get("baby_profile_id").and_then(Value::as_str))?;
    let entries = body
        .get("activities")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::BadRequest("activities must be an array".into()))?;

    if entries.is_empty() {
        return Ok(Json(json!({
            "success": true,
            "created": 0,
            "updated": 0,
            "softDeleted": 0,
            "syncedAt": now_timestamp(),
        })));
    }
    if entries.len() > MAX_PUSH_BATCH {
        return Err(AppError::BadRequest(format!(
            "Maximum {} activities per sync request",
            MAX_PUSH_BATCH
        )));
    }

    let profile = profiles::find_owned(
        &state.db,
        profile_id,
        &user.id,
        "You are not authorized to sync to this baby profile",
    )?;

    let changes = validate_batch(entries).map_err(|errors| {
        tracing::warn!(user_id = %user.id, rejected = errors.len(), "Sync batch failed validation");
        AppError::Validation(errors)
    })?;

    let outcome = state
        .activities
        .apply_batch(&user.id, profile.id, &changes)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user.id, error = %e, "Sync batch rolled back");
            AppError::from(e)
        })?;

    tracing::info!(
        user_id = %user.id,
        profile = %profile.document_id,
        created = outcome.created,
        updated = outcome.updated,
        soft_deleted = outcome.soft_deleted,
        "Sync push applied"
    );

    Ok(Json(json!({
        "success": true,
        "created": outcome.created,
        "updated": outcome.updated,
        "softDeleted": outcome.soft_deleted,
        "syncedAt": outcome.synced_at,
    })))
}

/// POST /api/baby-activities/bulk-delete
async fn bulk_delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(body): AppJson<Value>,
) -> AppResult<Json<Value>> {
    let ids = body
        .get("local_ids")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::BadRequest("local_ids must be an array".into()))?;

    if ids.is_empty() {
        return Ok(Json(json!({ "success": true, "deleted": 0 })));
    }
    if ids.len() > MAX_BULK_DELETE {
        return Err(AppError::BadRequest(format!(
            "Maximum {} local_ids per bulk delete request",
            MAX_BULK_DELETE
        )));
    }
    let local_ids = ids
        .iter()
        .map(|id| id.as_str().map(String::from))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| AppError::BadRequest("local_ids must be an array of strings".into()))?;

    let outcome = state
        .activities
        .delete_by_local_ids(&user.id, &local_ids)
        .await?;

    tracing::info!(
        user_id = %user.id,
        deleted = outcome.deleted,
        not_found = outcome.not_found.len(),
        "Bulk delete completed"
    );

    let mut response = json!({ "success": true, "deleted": outcome.deleted });
    if !outcome.not_found.is_empty() {
        response["notFound"] = json!(outcome.not_found);
    }
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub baby_profile_id: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub include_deleted: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

/// GET /api/baby-activities
async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let profile_id = required_profile_id(query.baby_profile_id.as_deref())?;
    let profile = profiles::find_owned(
        &state.db,
        profile_id,
        &user.id,
        "You are not authorized to access this baby profile",
    )?;

    let filter = ListFilter::parse(
        query.activity_type.as_deref(),
        query.from.as_deref(),
        query.to.as_deref(),
        query.include_deleted.as_deref(),
        query.page.as_deref(),
        query.page_size.as_deref(),
    );
    let (records, total) = state.activities.list(&user.id, profile.id, &filter).await?;
    let page_count = (total + filter.page_size - 1) / filter.page_size;

    Ok(Json(json!({
        "data": records,
        "meta": {
            "pagination": {
                "page": filter.page,
                "pageSize": filter.page_size,
                "pageCount": page_count,
                "total": total,
            }
        }
    })))
}

async fn owned_activity(
    state: &AppState,
    document_id: &str,
    user_id: &str,
    forbidden: &str,
) -> AppResult<ActivityRecord> {
    let record = state
        .activities
        .find(document_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Activity not found".into()))?;
    if record.user_id != user_id {
        return Err(AppError::Forbidden(forbidden.to_string()));
    }
    Ok(record)
}

/// GET /api/baby-activities/{document_id}
async fn find_one(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<String>,
) -> AppResult<Json<Value>> {
    let record = owned_activity(
        &state,
        &document_id,
        &user.id,
        "You are not authorized to view this activity",
    )
    .await?;
    Ok(Json(json!({ "data": record })))
}

/// DELETE /api/baby-activities/{document_id}
async fn delete_one(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<String>,
) -> AppResult<Json<Value>> {
    owned_activity(
        &state,
        &document_id,
        &user.id,
        "You are not authorized to delete this activity",
    )
    .await?;
    state.activities.delete(&document_id).await?;

    tracing::info!(user_id = %user.id, activity = %document_id, "Activity deleted");
    Ok(Json(json!({
        "data": null,
        "meta": { "deletedAt": now_timestamp() }
    })))
}
