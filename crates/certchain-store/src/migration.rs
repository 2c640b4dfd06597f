//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use certchain_core::Timestamp;
use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, Timestamp::now().to_canonical()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Issued certificates. certificate_hash holds the owning block's
        -- current_hash once the issuing transaction commits.
        CREATE TABLE certificates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_name TEXT NOT NULL,
            course TEXT NOT NULL,
            issued_date TEXT NOT NULL,        -- YYYY-MM-DDTHH:MM:SS.ffffff
            certificate_hash TEXT NOT NULL    -- lowercase hex
        );

        -- The chain. Insertion id is chain order.
        CREATE TABLE blocks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            previous_hash TEXT NOT NULL,      -- '0' for genesis
            current_hash TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            data TEXT NOT NULL                -- canonical certificate snapshot
        );

        CREATE INDEX idx_certificates_hash ON certificates(certificate_hash);
        CREATE INDEX idx_certificates_issued ON certificates(issued_date);
        CREATE INDEX idx_blocks_current ON blocks(current_hash);
        CREATE INDEX idx_blocks_previous ON blocks(previous_hash);
        "#,
    )?;

    Ok(())
}
