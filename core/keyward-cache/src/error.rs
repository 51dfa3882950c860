//! Error types for the cache layer.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Schema migration failed; the cache was left at `version - 1`.
    #[error("migration {version} failed: {message}")]
    Migration { version: i32, message: String },

    /// The database was written by a newer build.
    #[error("cache schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: i32, supported: i32 },

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No platform data directory to place the default cache in.
    #[error("no local data directory available")]
    NoDataDir,

    /// The connection lock was poisoned by a panicking writer.
    #[error("cache lock poisoned")]
    Poisoned,
}
