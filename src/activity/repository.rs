// Repository pattern - isolates all database side effects
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::sync::Arc;
use thiserror::Error;

use crate::activity::domain::*;
use crate::db::{generate_document_id, now_timestamp};
use crate::db::models::ActivityRecord;
use crate::error::AppError;
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
            RepositoryError::Serialization(e) => AppError::Json(e),
        }
    }
}

/// One page of a sync pull.
#[derive(Debug, Clone, PartialEq)]
pub struct PullPage {
    pub records: Vec<ActivityRecord>,
    /// Rows matching the cursor, ignoring the page window.
    pub total: i64,
    /// Cursor for the next pull.
    pub server_time: String,
}

impl PullPage {
    pub fn has_more(&self, window: PullWindow) -> bool {
        window.offset + (self.records.len() as i64) < self.total
    }
}

/// Repository trait - all activity storage operations
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Every row of the profile (soft-deleted included) updated at or after
    /// `since`, oldest update first. Rows on the boundary may be delivered
    /// twice; upserting clients ignore the repeat.
    async fn pull(
        &self,
        owner: &str,
        profile_id: i64,
        since: Option<&str>,
        window: PullWindow,
    ) -> Result<PullPage, RepositoryError>;

    /// Upsert every change by `(owner, local_id)` in one transaction.
    /// Either all changes land or none do.
    async fn apply_batch(
        &self,
        owner: &str,
        profile_id: i64,
        changes: &[ActivityChange],
    ) -> Result<SyncOutcome, RepositoryError>;

    /// Filtered listing by event time, newest first. Returns the page and the
    /// unpaged total.
    async fn list(
        &self,
        owner: &str,
        profile_id: i64,
        filter: &ListFilter,
    ) -> Result<(Vec<ActivityRecord>, i64), RepositoryError>;

    async fn find(&self, document_id: &str) -> Result<Option<ActivityRecord>, RepositoryError>;

    /// Hard delete by document id
    async fn delete(&self, document_id: &str) -> Result<bool, RepositoryError>;

    /// Hard delete the owner's rows by local id
    async fn delete_by_local_ids(
        &self,
        owner: &str,
        local_ids: &[String],
    ) -> Result<BulkDeleteOutcome, RepositoryError>;
}

/// SQLite implementation
pub struct SqliteActivityRepository {
    pool: DbPool,
}

fn payload_json(data: &Option<serde_json::Value>) -> Result<Option<String>, RepositoryError> {
    Ok(data.as_ref().map(serde_json::to_string).transpose()?)
}

impl SqliteActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Pull with the cursor read from `clock` while the write lock is held.
    /// No batch can commit between reading the cursor and reading the rows,
    /// and later batches stamp their rows at or after the cursor.
    pub fn pull_with(
        &self,
        owner: &str,
        profile_id: i64,
        since: Option<&str>,
        window: PullWindow,
        clock: impl FnOnce() -> String,
    ) -> Result<PullPage, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let server_time = clock();

        let total: i64 = tx.query_row(
            "SELECT COUNT(*) FROM baby_activities
             WHERE user_id = ?1 AND baby_profile_id = ?2
               AND (?3 IS NULL OR updated_at >= ?3)",
            params![owner, profile_id, since],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM baby_activities
             WHERE user_id = ?1 AND baby_profile_id = ?2
               AND (?3 IS NULL OR updated_at >= ?3)
             ORDER BY updated_at ASC, id ASC
             LIMIT ?4 OFFSET ?5",
            ActivityRecord::COLUMNS
        );
        let records = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![owner, profile_id, since, window.limit, window.offset],
                    ActivityRecord::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        tx.commit()?;

        Ok(PullPage {
            records,
            total,
            server_time,
        })
    }

    /// Apply a batch stamped with `clock`, read once the write lock is held.
    pub fn apply_batch_with(
        &self,
        owner: &str,
        profile_id: i64,
        changes: &[ActivityChange],
        clock: impl FnOnce() -> String,
    ) -> Result<SyncOutcome, RepositoryError> {
        let mut conn = self.pool.get()?;

        // ATOMIC TRANSACTION - all or nothing. Dropping `tx` on any early
        // return rolls it back.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let synced_at = clock();
        let mut outcome = SyncOutcome::default();

        {
            let mut find = tx.prepare(
                "SELECT id FROM baby_activities WHERE user_id = ?1 AND local_id = ?2",
            )?;
            let mut update = tx.prepare(
                "UPDATE baby_activities SET
                   activity_type = ?1,
                   timestamp = ?2,
                   data = COALESCE(?3, data),
                   synced_at = ?4,
                   updated_at = ?4,
                   deleted_at = CASE WHEN ?5 THEN ?6 ELSE deleted_at END,
                   client_updated_at = COALESCE(?7, client_updated_at)
                 WHERE id = ?8",
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO baby_activities
                   (document_id, local_id, user_id, baby_profile_id, activity_type, timestamp,
                    data, deleted_at, client_updated_at, synced_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, ?10)",
            )?;

            for change in changes {
                let data = payload_json(&change.data)?;
                let existing: Option<i64> = find
                    .query_row(params![owner, change.local_id], |row| row.get(0))
                    .optional()?;

                match existing {
                    Some(id) => {
                        let touches_deleted = change.deleted_at.is_some();
                        let deleted_at = change.deleted_at.clone().flatten();
                        update.execute(params![
                            change.activity_type.as_str(),
                            change.timestamp,
                            data,
                            synced_at,
                            touches_deleted,
                            deleted_at,
                            change.client_updated_at,
                            id,
                        ])?;
                        outcome.updated += 1;
                    }
                    None => {
                        insert.execute(params![
                            generate_document_id(),
                            change.local_id,
                            owner,
                            profile_id,
                            change.activity_type.as_str(),
                            change.timestamp,
                            data,
                            change.deleted_at.clone().flatten(),
                            change.client_updated_at,
                            synced_at,
                        ])?;
                        outcome.created += 1;
                    }
                }

                if change.is_soft_delete() {
                    outcome.soft_deleted += 1;
                }
            }
        }

        tx.commit()?;
        outcome.synced_at = synced_at;
        Ok(outcome)
    }
}

#[async_trait]
impl ActivityRepository for SqliteActivityRepository {
    async fn pull(
        &self,
        owner: &str,
        profile_id: i64,
        since: Option<&str>,
        window: PullWindow,
    ) -> Result<PullPage, RepositoryError> {
        self.pull_with(owner, profile_id, since, window, now_timestamp)
    }

    async fn apply_batch(
        &self,
        owner: &str,
        profile_id: i64,
        changes: &[ActivityChange],
    ) -> Result<SyncOutcome, RepositoryError> {
        self.apply_batch_with(owner, profile_id, changes, now_timestamp)
    }

    async fn list(
        &self,
        owner: &str,
        profile_id: i64,
        filter: &ListFilter,
    ) -> Result<(Vec<ActivityRecord>, i64), RepositoryError> {
        let conn = self.pool.get()?;

        let predicate = "user_id = ?1 AND baby_profile_id = ?2
               AND (?3 OR deleted_at IS NULL)
               AND (?4 IS NULL OR activity_type = ?4)
               AND (?5 IS NULL OR timestamp >= ?5)
               AND (?6 IS NULL OR timestamp <= ?6)";
        let activity_type = filter.activity_type.map(|t| t.as_str());

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM baby_activities WHERE {}", predicate),
            params![
                owner,
                profile_id,
                filter.include_deleted,
                activity_type,
                filter.from,
                filter.to
            ],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM baby_activities WHERE {}
             ORDER BY timestamp DESC, id DESC
             LIMIT ?7 OFFSET ?8",
            ActivityRecord::COLUMNS,
            predicate
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                params![
                    owner,
                    profile_id,
                    filter.include_deleted,
                    activity_type,
                    filter.from,
                    filter.to,
                    filter.page_size,
                    filter.offset()
                ],
                ActivityRecord::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((records, total))
    }

    async fn find(&self, document_id: &str) -> Result<Option<ActivityRecord>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM baby_activities WHERE document_id = ?1",
            ActivityRecord::COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![document_id], ActivityRecord::from_row)
            .optional()?)
    }

    async fn delete(&self, document_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM baby_activities WHERE document_id = ?1",
            params![document_id],
        )?;
        Ok(rows > 0)
    }

    async fn delete_by_local_ids(
        &self,
        owner: &str,
        local_ids: &[String],
    ) -> Result<BulkDeleteOutcome, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let mut outcome = BulkDeleteOutcome::default();

        {
            let mut delete =
                tx.prepare("DELETE FROM baby_activities WHERE user_id = ?1 AND local_id = ?2")?;
            for local_id in local_ids {
                let rows = delete.execute(params![owner, local_id])?;
                if rows == 0 {
                    outcome.not_found.push(local_id.clone());
                } else {
                    outcome.deleted += rows as u64;
                }
            }
        }

        tx.commit()?;
        Ok(outcome)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynActivityRepository = Arc<dyn ActivityRepository>;
