use rusqlite::{params, OptionalExtension};

use crate::db::models::BabyProfile;
use crate::db::{generate_document_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::profile::domain::ProfileFields;
use crate::state::DbPool;

pub fn find(pool: &DbPool, document_id: &str) -> AppResult<Option<BabyProfile>> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {} FROM baby_profiles WHERE document_id = ?1",
        BabyProfile::COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![document_id], BabyProfile::from_row)
        .optional()?)
}

/// Load a profile and make sure `user_id` owns it: 404 when it does not
/// exist, 403 with `forbidden` when it belongs to someone else.
pub fn find_owned(
    pool: &DbPool,
    document_id: &str,
    user_id: &str,
    forbidden: &str,
) -> AppResult<BabyProfile> {
    let profile = find(pool, document_id)?
        .ok_or_else(|| AppError::NotFound("Baby profile not found".into()))?;
    if profile.user_id != user_id {
        tracing::warn!(profile = %document_id, user_id = %user_id, "Profile ownership mismatch");
        return Err(AppError::Forbidden(forbidden.to_string()));
    }
    Ok(profile)
}

pub fn list_for_user(pool: &DbPool, user_id: &str) -> AppResult<Vec<BabyProfile>> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {} FROM baby_profiles WHERE user_id = ?1 ORDER BY id",
        BabyProfile::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let profiles = stmt
        .query_map(params![user_id], BabyProfile::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(profiles)
}

pub fn insert(pool: &DbPool, user_id: &str, fields: &ProfileFields) -> AppResult<BabyProfile> {
    let conn = pool.get()?;
    let now = now_timestamp();
    let document_id = generate_document_id();
    conn.execute(
        "INSERT INTO baby_profiles
           (document_id, user_id, name, birthdate, avatar_url, is_premature, premature_weeks,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            document_id,
            user_id,
            fields.name,
            fields.birthdate,
            fields.avatar_url,
            fields.is_premature,
            fields.premature_weeks,
            now
        ],
    )?;
    drop(conn);

    find(pool, &document_id)?
        .ok_or_else(|| AppError::Internal("Created profile vanished".into()))
}

pub fn update(pool: &DbPool, document_id: &str, fields: &ProfileFields) -> AppResult<BabyProfile> {
    let conn = pool.get()?;
    conn.execute(
        "UPDATE baby_profiles SET
           name = ?1, birthdate = ?2, avatar_url = ?3, is_premature = ?4,
           premature_weeks = ?5, updated_at = ?6
         WHERE document_id = ?7",
        params![
            fields.name,
            fields.birthdate,
            fields.avatar_url,
            fields.is_premature,
            fields.premature_weeks,
            now_timestamp(),
            document_id
        ],
    )?;
    drop(conn);

    find(pool, document_id)?.ok_or_else(|| AppError::NotFound("Baby profile not found".into()))
}

/// Remove a profile together with all of its activities in one transaction.
/// Returns how many activities went with it.
pub fn delete_with_activities(pool: &DbPool, profile: &BabyProfile) -> AppResult<usize> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let activities = tx.execute(
        "DELETE FROM baby_activities WHERE baby_profile_id = ?1",
        params![profile.id],
    )?;
    tx.execute("DELETE FROM baby_profiles WHERE id = ?1", params![profile.id])?;
    tx.commit()?;
    Ok(activities)
}
