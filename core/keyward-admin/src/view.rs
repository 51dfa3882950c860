//! Operator-facing status and list rows.
//!
//! Derived from the same [`Standing`] the device validator uses, so a row
//! can never contradict what a client would decide about the same record.

use chrono::NaiveDate;
use keyward_types::{LicenseRecord, LicenseToken, Standing, is_expiring_soon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Status shown in the operator's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryStatus {
    /// Live and not yet activated.
    Available,
    /// Live and bound to a device.
    InUse,
    /// Live, but expires within the warning window.
    ExpiringSoon,
    Expired,
    Blacklisted,
    /// Soft-deleted.
    Deleted,
}

impl RegistryStatus {
    /// All variants, in declaration order.
    pub const ALL: [RegistryStatus; 6] = [
        Self::Available,
        Self::InUse,
        Self::ExpiringSoon,
        Self::Expired,
        Self::Blacklisted,
        Self::Deleted,
    ];

    /// Applies the shared precedence to a record.
    #[must_use]
    pub fn derive(record: &LicenseRecord, today: NaiveDate, window_days: u32) -> Self {
        match record.standing(today) {
            Standing::Deleted => Self::Deleted,
            Standing::Blacklisted => Self::Blacklisted,
            Standing::Expired => Self::Expired,
            Standing::Unbound | Standing::Bound(_)
                if is_expiring_soon(record.expiry_date, today, window_days) =>
            {
                Self::ExpiringSoon
            }
            Standing::Unbound => Self::Available,
            Standing::Bound(_) => Self::InUse,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InUse => "in_use",
            Self::ExpiringSoon => "expiring_soon",
            Self::Expired => "expired",
            Self::Blacklisted => "blacklisted",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for RegistryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the operator's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// The record as the authority returned it.
    pub record: LicenseRecord,
    /// Status derived at fetch time.
    pub status: RegistryStatus,
    /// Days until expiry at fetch time, never negative.
    pub remaining_days: u32,
}

impl RegistryEntry {
    #[must_use]
    pub fn from_record(record: LicenseRecord, today: NaiveDate, window_days: u32) -> Self {
        let status = RegistryStatus::derive(&record, today, window_days);
        let remaining_days = record.remaining_days(today);
        Self {
            record,
            status,
            remaining_days,
        }
    }

    #[must_use]
    pub fn token(&self) -> &LicenseToken {
        &self.record.token
    }

    /// Case-insensitive substring match on token or memo.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.record.token.as_str().to_lowercase().contains(&query)
            || self.record.memo.to_lowercase().contains(&query)
    }
}

/// Count of rows per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySummary {
    pub total: usize,
    pub by_status: BTreeMap<RegistryStatus, usize>,
}

impl RegistrySummary {
    #[must_use]
    pub fn of<'a>(entries: impl IntoIterator<Item = &'a RegistryEntry>) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            summary.total += 1;
            *summary.by_status.entry(entry.status).or_insert(0) += 1;
        }
        summary
    }

    /// Rows with `status`, zero if none.
    #[must_use]
    pub fn count(&self, status: RegistryStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}
