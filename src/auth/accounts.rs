use rusqlite::{params, ErrorCode, TransactionBehavior};

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

const TAKEN: &str = "Username or email is already taken";

/// Create an account. The uniqueness check, the first-user admin decision
/// and the insert share one write transaction.
pub fn create_user(
    pool: &DbPool,
    username: &str,
    email: Option<&str>,
    password_hash: &str,
) -> AppResult<User> {
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let taken: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1 OR (email IS NOT NULL AND email = ?2)",
        params![username, email],
        |row| row.get(0),
    )?;
    if taken {
        return Err(AppError::BadRequest(TAKEN.into()));
    }

    let user_count: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    let id = uuid::Uuid::now_v7().to_string();
    tx.execute(
        "INSERT INTO users (id, username, email, password_hash, is_admin) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, username, email, password_hash, user_count == 0],
    )
    .map_err(|e| match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => AppError::BadRequest(TAKEN.into()),
        _ => AppError::Database(e),
    })?;
    let user = tx.query_row("SELECT * FROM users WHERE id = ?1", params![id], User::from_row)?;

    tx.commit()?;
    Ok(user)
}
