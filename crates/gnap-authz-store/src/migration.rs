//! Database schema migrations for SQLite.
//!
//! Simple versioned migrations. Each migration transforms the schema from
//! version N to N+1.

use rusqlite::Connection;

use gnap_authz_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated session schema");
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
        -- One row per client or resource-server instance
        CREATE TABLE sessions (
            client_id TEXT PRIMARY KEY,          -- 16 bytes, hex
            key_fingerprint BLOB NOT NULL UNIQUE,-- 32 bytes, Blake3 of public_key
            public_key BLOB NOT NULL,            -- 32 bytes, Ed25519
            proof TEXT NOT NULL,                 -- proof method bound at creation
            continue_token TEXT UNIQUE,          -- current continuation token, hex
            continue_issued_at INTEGER,          -- Unix ms
            pending BLOB NOT NULL,               -- CBOR array of token requests
            created_at INTEGER NOT NULL          -- Unix ms
        );

        -- Issued access tokens; value is unique store-wide
        CREATE TABLE access_tokens (
            value TEXT PRIMARY KEY,              -- 32 bytes, hex
            client_id TEXT NOT NULL REFERENCES sessions(client_id),
            issued_seq INTEGER NOT NULL,         -- issue order within the session
            access BLOB NOT NULL,                -- CBOR array of access descriptors
            flags BLOB NOT NULL,                 -- CBOR array of flags
            label TEXT,
            issued_at INTEGER NOT NULL,
            expires_at INTEGER
        );

        -- Subject attributes disclosed to a session
        CREATE TABLE subject_data (
            client_id TEXT NOT NULL REFERENCES sessions(client_id),
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (client_id, name)
        );

        CREATE INDEX idx_access_tokens_client ON access_tokens(client_id, issued_seq);
        "#,
    )?;

    Ok(())
}
