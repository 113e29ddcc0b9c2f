pub mod models;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rand::Rng;
use rusqlite::params;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_baby_profiles",
        include_str!("../../migrations/002_baby_profiles.sql"),
    ),
    (
        "003_baby_activities",
        include_str!("../../migrations/003_baby_activities.sql"),
    ),
    (
        "004_vouchers",
        include_str!("../../migrations/004_vouchers.sql"),
    ),
    (
        "005_plugin_settings",
        include_str!("../../migrations/005_plugin_settings.sql"),
    ),
];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connection-level pragmas must be set on every pooled connection
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA synchronous = NORMAL;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!(migration = %name, "Applying migration");
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Canonical storage format for server timestamps: UTC, millisecond
/// precision, `Z` suffix. Lexicographic order equals chronological order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse any RFC 3339 instant and re-render it in the canonical format.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| format_timestamp(dt.with_timezone(&Utc)))
}

/// Opaque 24-character identifier exposed to clients in place of row ids.
pub fn generate_document_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..24)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn test_pool() -> (DbPool, TempDir) {
        let tmp = TempDir::new().unwrap();
        let pool = create_pool(&tmp.path().join("test.db")).unwrap();
        run_migrations(&pool).unwrap();
        (pool, tmp)
    }

    pub(crate) fn insert_user(pool: &DbPool, id: &str, username: &str) {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (id, username) VALUES (?1, ?2)",
            params![id, username],
        )
        .unwrap();
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn every_pooled_connection_enforces_foreign_keys() {
        let (pool, _tmp) = test_pool();
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        for conn in [&a, &b] {
            let on: bool = conn
                .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                .unwrap();
            assert!(on);
        }
    }

    #[test]
    fn migrations_run_successfully() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        for table in [
            "users",
            "sessions",
            "baby_profiles",
            "baby_activities",
            "vouchers",
            "plugin_settings",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let (pool, _tmp) = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn local_id_is_unique_per_owner() {
        let (pool, _tmp) = test_pool();
        insert_user(&pool, "u1", "alice");
        insert_user(&pool, "u2", "bob");
        let conn = pool.get().unwrap();
        for (id, user) in [(1, "u1"), (2, "u2")] {
            conn.execute(
                "INSERT INTO baby_profiles (id, document_id, user_id, name, birthdate, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'Baby', '2024-01-01', 'x', 'x')",
                params![id, format!("doc{}", id), user],
            )
            .unwrap();
        }

        let insert = |doc: &str, user: &str, profile: i64| {
            conn.execute(
                "INSERT INTO baby_activities (document_id, local_id, user_id, baby_profile_id, activity_type, timestamp, created_at, updated_at)
                 VALUES (?1, 'same-local', ?2, ?3, 'pee', 't', 't', 't')",
                params![doc, user, profile],
            )
        };
        insert("a1", "u1", 1).unwrap();
        // Another owner may reuse the local id
        insert("a2", "u2", 2).unwrap();
        // The same owner may not
        assert!(insert("a3", "u1", 1).is_err());
    }

    #[test]
    fn foreign_keys_enforced() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO baby_profiles (document_id, user_id, name, birthdate, created_at, updated_at)
             VALUES ('d', 'nonexistent-user', 'Baby', '2024-01-01', 'x', 'x')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn document_ids_are_24_lowercase_alphanumerics() {
        let id = generate_document_id();
        assert_eq!(id.len(), 24);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(id, generate_document_id());
    }

    #[test]
    fn normalize_timestamp_renders_utc_millis() {
        assert_eq!(
            normalize_timestamp("2024-03-01T10:00:00+02:00").as_deref(),
            Some("2024-03-01T08:00:00.000Z")
        );
        assert_eq!(
            normalize_timestamp("2024-03-01T08:00:00.123456Z").as_deref(),
            Some("2024-03-01T08:00:00.123Z")
        );
        assert!(normalize_timestamp("yesterday").is_none());
    }
}
