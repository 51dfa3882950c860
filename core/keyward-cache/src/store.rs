//! SQLite-backed license cache.
//!
//! Every write runs in a single transaction, so a reader sees either the
//! previous row or the complete new one, and a crash mid-write rolls back to
//! the previous row.

use crate::entry::{CacheEntry, CacheLookup};
use crate::error::{CacheError, CacheResult};
use crate::migrations::run_migrations;
use chrono::{DateTime, NaiveDate, Utc};
use keyward_types::{LicenseStatus, LicenseToken};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// File name of the default cache database.
pub const DEFAULT_CACHE_FILE: &str = "license-cache.db";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw column values of one cache row, before decoding.
struct RawRow {
    token: String,
    status: String,
    expiry_date: Option<String>,
    fingerprint_hash: String,
    app_name: String,
    last_checked_at: String,
}

/// Device-local mirror of the last known state of each token.
pub struct LocalLicenseCache {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl LocalLicenseCache {
    /// Opens (or creates) a cache at the given path and migrates it.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Opens the cache in the platform's local data directory under `app_dir`.
    pub fn open_default(app_dir: &str) -> CacheResult<Self> {
        let base = dirs::data_local_dir().ok_or(CacheError::NoDataDir)?;
        Self::open(base.join(app_dir).join(DEFAULT_CACHE_FILE))
    }

    /// Opens an in-memory cache (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> CacheResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the backing file, `None` for in-memory caches.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Looks up a token.
    ///
    /// The logged-out sentinel wins over any entry. A row that cannot be
    /// decoded is reported as [`CacheLookup::Absent`].
    pub fn get(&self, token: &LicenseToken) -> CacheResult<CacheLookup> {
        let conn = self.lock()?;

        let logged_out: Option<String> = conn
            .query_row(
                "SELECT marked_at FROM logged_out WHERE token = ?1",
                params![token.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if logged_out.is_some() {
            return Ok(CacheLookup::LoggedOut);
        }

        let raw = conn
            .query_row(
                "SELECT token, status, expiry_date, fingerprint_hash, app_name, last_checked_at
                 FROM license_cache WHERE token = ?1",
                params![token.as_str()],
                |row| {
                    Ok(RawRow {
                        token: row.get(0)?,
                        status: row.get(1)?,
                        expiry_date: row.get(2)?,
                        fingerprint_hash: row.get(3)?,
                        app_name: row.get(4)?,
                        last_checked_at: row.get(5)?,
                    })
                },
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(CacheLookup::Absent);
        };

        match decode_row(raw) {
            Ok(entry) => Ok(CacheLookup::Entry(entry)),
            Err(reason) => {
                warn!("ignoring undecodable cache entry for {}: {}", token, reason);
                Ok(CacheLookup::Absent)
            }
        }
    }

    /// Writes (or overwrites) an entry and lifts any logged-out sentinel.
    pub fn put(&self, entry: &CacheEntry) -> CacheResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO license_cache
                (token, status, expiry_date, fingerprint_hash, app_name, last_checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(token) DO UPDATE SET
                status = excluded.status,
                expiry_date = excluded.expiry_date,
                fingerprint_hash = excluded.fingerprint_hash,
                app_name = excluded.app_name,
                last_checked_at = excluded.last_checked_at",
            params![
                entry.token.as_str(),
                entry.status.as_str(),
                entry.expiry_date.map(|d| d.format(DATE_FORMAT).to_string()),
                entry.fingerprint_hash,
                entry.app_name,
                entry.last_checked_at.to_rfc3339(),
            ],
        )?;
        tx.execute(
            "DELETE FROM logged_out WHERE token = ?1",
            params![entry.token.as_str()],
        )?;
        tx.commit()?;
        debug!("cached {} as {}", entry.token, entry.status);
        Ok(())
    }

    /// Removes the entry and any logged-out sentinel.
    pub fn clear(&self, token: &LicenseToken) -> CacheResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM license_cache WHERE token = ?1",
            params![token.as_str()],
        )?;
        tx.execute(
            "DELETE FROM logged_out WHERE token = ?1",
            params![token.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Drops the entry and sets the logged-out sentinel.
    pub fn mark_logged_out(&self, token: &LicenseToken, at: DateTime<Utc>) -> CacheResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM license_cache WHERE token = ?1",
            params![token.as_str()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO logged_out (token, marked_at) VALUES (?1, ?2)",
            params![token.as_str(), at.to_rfc3339()],
        )?;
        tx.commit()?;
        debug!("marked {} logged out", token);
        Ok(())
    }

    /// Lists tokens that currently have a cache row, sorted.
    pub fn tokens(&self) -> CacheResult<Vec<LicenseToken>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT token FROM license_cache ORDER BY token")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for row in rows {
            let raw = row?;
            match LicenseToken::parse(&raw) {
                Ok(token) => result.push(token),
                Err(e) => warn!("skipping cache row with invalid token: {e}"),
            }
        }
        Ok(result)
    }
}

impl std::fmt::Debug for LocalLicenseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLicenseCache")
            .field("path", &self.path)
            .finish()
    }
}

fn decode_row(raw: RawRow) -> Result<CacheEntry, String> {
    let token = LicenseToken::parse(&raw.token).map_err(|e| e.to_string())?;
    let status: LicenseStatus = raw.status.parse().map_err(|e| format!("{e}"))?;
    let expiry_date = raw
        .expiry_date
        .map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT))
        .transpose()
        .map_err(|e| format!("invalid expiry date: {e}"))?;
    let last_checked_at = DateTime::parse_from_rfc3339(&raw.last_checked_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid last_checked_at: {e}"))?;

    Ok(CacheEntry {
        token,
        status,
        expiry_date,
        fingerprint_hash: raw.fingerprint_hash,
        app_name: raw.app_name,
        last_checked_at,
    })
}
