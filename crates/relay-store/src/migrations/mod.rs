//! Schema migration runner.
//!
//! Migrations are embedded at compile time via [`include_str!`] and executed
//! in version order, each inside its own transaction. The `schema_version`
//! table records what has been applied; re-running is a no-op.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Accounts, conversations and messages for both chat domains",
        sql: include_str!("v001_schema.sql"),
    },
    Migration {
        version: 2,
        description: "Chat notification feed",
        sql: include_str!("v002_chat_notifications.sql"),
    },
];

/// Run all pending migrations on the given connection.
///
/// Returns how many migrations were applied.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version <= current {
            debug!(
                version = migration.version,
                "migration already applied, skipping"
            );
            continue;
        }

        info!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );
        apply_migration(conn, migration)?;
        applied += 1;
    }

    Ok(applied)
}

/// Return the highest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::Migration {
        message: format!("failed to read schema_version: {e}"),
    })
}

/// Return the latest migration version defined in code.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
           version     INTEGER PRIMARY KEY,
           applied_at  TEXT    NOT NULL,
           description TEXT
         );",
    )
    .map_err(|e| StoreError::Migration {
        message: format!("failed to create schema_version table: {e}"),
    })
}

fn apply_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    let fail = |stage: &str, e: rusqlite::Error| StoreError::Migration {
        message: format!("v{} ({}) {stage}: {e}", migration.version, migration.description),
    };

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| fail("begin", e))?;
    tx.execute_batch(migration.sql)
        .map_err(|e| fail("failed", e))?;
    let _ = tx
        .execute(
            "INSERT INTO schema_version (version, applied_at, description)
             VALUES (?1, datetime('now'), ?2)",
            rusqlite::params![migration.version, migration.description],
        )
        .map_err(|e| fail("record", e))?;
    tx.commit().map_err(|e| fail("commit", e))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    fn open_memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect()
    }

    #[test]
    fn creates_all_tables() {
        let conn = open_memory();
        assert_eq!(run_migrations(&conn).unwrap(), 2);

        let tables = table_names(&conn);
        for table in [
            "admin_conversations",
            "admin_messages",
            "admins",
            "chat_notifications",
            "client_repairman_conversations",
            "client_repairman_messages",
            "schema_version",
            "users",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table: {table}");
        }
    }

    #[test]
    fn idempotent() {
        let conn = open_memory();
        assert_eq!(run_migrations(&conn).unwrap(), 2);
        assert_eq!(run_migrations(&conn).unwrap(), 0);
        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn current_version_starts_at_zero() {
        let conn = open_memory();
        ensure_version_table(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 0);
    }

    #[test]
    fn pair_index_rejects_swapped_duplicate() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO admin_conversations
               (participant_a, participant_b, pair_low, pair_high, created_at, updated_at)
             VALUES (1, 2, 1, 2, 'now', 'now')",
            [],
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO admin_conversations
                   (participant_a, participant_b, pair_low, pair_high, created_at, updated_at)
                 VALUES (2, 1, 1, 2, 'now', 'now')",
                [],
            )
            .unwrap_err();
        assert!(err.to_string().contains("UNIQUE"), "got: {err}");
    }

    #[test]
    fn pair_columns_must_be_sorted() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        let err = conn
            .execute(
                "INSERT INTO client_repairman_conversations
                   (participant_a, participant_b, pair_low, pair_high, created_at, updated_at)
                 VALUES (5, 3, 5, 3, 'now', 'now')",
                [],
            )
            .unwrap_err();
        assert!(err.to_string().contains("CHECK"), "got: {err}");
    }

    #[test]
    fn messages_require_existing_conversation() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO admin_messages (conversation_id, sender_id, content, created_at)
             VALUES (404, 1, 'orphan', 'now')",
            [],
        );
        assert!(result.is_err());
    }
}
