//! Cached license state.

use chrono::{DateTime, NaiveDate, Utc};
use keyward_types::{LicenseStatus, LicenseToken};
use serde::{Deserialize, Serialize};

/// Last known authoritative state of one token on this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The token this entry mirrors.
    pub token: LicenseToken,
    /// Status reported by the last validation.
    pub status: LicenseStatus,
    /// Expiry date as last reported by the authority, if the token was known.
    pub expiry_date: Option<NaiveDate>,
    /// Fingerprint hash the validation ran under.
    pub fingerprint_hash: String,
    /// Application the validation ran for.
    pub app_name: String,
    /// Time of the last successful round-trip to the authority.
    pub last_checked_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Returns true if this entry was written for the given device and app.
    #[must_use]
    pub fn belongs_to(&self, fingerprint_hash: &str, app_name: &str) -> bool {
        self.fingerprint_hash == fingerprint_hash && self.app_name == app_name
    }
}

/// What the cache holds for a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Nothing usable (never written, cleared, or undecodable).
    Absent,
    /// The token was logged out; the next decision must come from the
    /// authority.
    LoggedOut,
    /// A decodable entry.
    Entry(CacheEntry),
}

impl CacheLookup {
    /// Returns the entry, if any.
    #[must_use]
    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            Self::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    /// Returns true if the logged-out sentinel is set.
    #[must_use]
    pub fn is_logged_out(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}
