//! The authority's license record.

use crate::LicenseToken;
use crate::status::{LicenseStatus, Standing, remaining_days};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The (fingerprint, app) pair a token is currently bound to.
///
/// Hash and app name only ever exist together; a record is either unbound
/// or carries both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Fingerprint hash of the device that activated the token.
    pub fingerprint_hash: String,
    /// Application the token was activated for.
    pub app_name: String,
    /// When the binding was established.
    pub bound_at: DateTime<Utc>,
}

/// One license as the remote authority knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Unique token.
    pub token: LicenseToken,
    /// Status last written by the authority or an operator.
    ///
    /// Informational only: decisions are always re-derived from the raw
    /// fields through [`LicenseRecord::standing`].
    pub status: LicenseStatus,
    /// When the record was issued.
    pub created_at: DateTime<Utc>,
    /// Last calendar day on which the license is valid.
    pub expiry_date: NaiveDate,
    /// Operator free text.
    pub memo: String,
    /// Operator blacklist flag.
    pub blacklisted: bool,
    /// Number of successful first-time bindings.
    pub activation_count: u32,
    /// Current binding, if any.
    pub binding: Option<Binding>,
    /// Last time a device checked this record in.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Soft-delete flag. Records are never physically removed.
    pub deleted: bool,
}

impl LicenseRecord {
    /// Creates a freshly issued, unbound record.
    #[must_use]
    pub fn issue(
        token: LicenseToken,
        expiry_date: NaiveDate,
        memo: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            status: LicenseStatus::Available,
            created_at,
            expiry_date,
            memo: memo.into(),
            blacklisted: false,
            activation_count: 0,
            binding: None,
            last_checked_at: None,
            deleted: false,
        }
    }

    /// Returns true if a device binding is recorded.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Returns the bound fingerprint hash, if any.
    #[must_use]
    pub fn bound_fingerprint_hash(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.fingerprint_hash.as_str())
    }

    /// Returns the bound application name, if any.
    #[must_use]
    pub fn bound_app_name(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.app_name.as_str())
    }

    /// Applies the fixed precedence rule to this record's raw fields.
    #[must_use]
    pub fn standing(&self, today: NaiveDate) -> Standing<'_> {
        Standing::of(self, today)
    }

    /// Whole days left until expiry, never negative.
    #[must_use]
    pub fn remaining_days(&self, today: NaiveDate) -> u32 {
        remaining_days(self.expiry_date, today)
    }
}

/// Partial update applied by `PatchLicense`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePatch {
    /// New stored status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LicenseStatus>,
    /// New expiry date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
}

impl LicensePatch {
    /// A patch that only moves the expiry date.
    #[must_use]
    pub fn expiry(date: NaiveDate) -> Self {
        Self {
            status: None,
            expiry_date: Some(date),
        }
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.expiry_date.is_none()
    }
}
