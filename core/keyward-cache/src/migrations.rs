//! Versioned schema migrations for the license cache.
//!
//! The schema version lives in `PRAGMA user_version`. Pending migrations run
//! in order, each inside its own transaction together with the version bump,
//! before the cache hands out a single row.

use crate::error::{CacheError, CacheResult};
use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

/// A schema migration.
pub struct Migration {
    /// Version number (sequential, starting from 1).
    pub version: i32,
    /// Human-readable description.
    pub description: &'static str,
    /// The migration function.
    pub up: fn(&Transaction<'_>) -> rusqlite::Result<()>,
}

/// All migrations in order. Add new migrations to the end of this list.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "baseline license_cache table",
        up: migration_001_baseline,
    },
    Migration {
        version: 2,
        description: "per-app binding column and logout markers",
        up: migration_002_app_name_and_logout,
    },
];

/// Highest schema version this build understands.
#[must_use]
pub fn latest_version() -> i32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Reads the current schema version.
pub fn current_version(conn: &Connection) -> rusqlite::Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Runs every migration newer than the database's current version.
pub fn run_migrations(conn: &mut Connection) -> CacheResult<()> {
    let found = current_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(CacheError::UnsupportedVersion { found, supported });
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > found).collect();
    if pending.is_empty() {
        debug!("license cache at version {} (up to date)", found);
        return Ok(());
    }

    info!(
        "license cache at version {}, {} migration(s) pending",
        found,
        pending.len()
    );

    for migration in pending {
        let tx = conn.transaction()?;
        (migration.up)(&tx).map_err(|e| CacheError::Migration {
            version: migration.version,
            message: e.to_string(),
        })?;
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
        info!(
            "applied cache migration {}: {}",
            migration.version, migration.description
        );
    }
    Ok(())
}

fn migration_001_baseline(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS license_cache (
            token TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            expiry_date TEXT,
            fingerprint_hash TEXT NOT NULL,
            last_checked_at TEXT NOT NULL
        );
        ",
    )
}

fn migration_002_app_name_and_logout(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        "
        ALTER TABLE license_cache ADD COLUMN app_name TEXT NOT NULL DEFAULT '';

        CREATE TABLE IF NOT EXISTS logged_out (
            token TEXT PRIMARY KEY,
            marked_at TEXT NOT NULL
        );
        ",
    )
}
