use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::models::User;
use crate::error::AppResult;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token. Expired
/// sessions are swept on the way.
pub fn create_session(pool: &DbPool, user_id: &str, hours: u64) -> AppResult<String> {
    purge_expired(pool)?;
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Resolve a live session token to its user.
pub fn find_user_by_token(pool: &DbPool, token: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT u.* FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Delete every expired session. Returns how many were removed.
pub fn purge_expired(pool: &DbPool) -> AppResult<usize> {
    let conn = pool.get()?;
    Ok(conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
