//! License status and the single status-derivation rule.
//!
//! Precedence, highest first: deleted, blacklisted, expired, binding.
//! The device path and the operator path both start from [`Standing`] and
//! only differ in how they present a bound record.

use crate::TypeError;
use crate::record::{Binding, LicenseRecord};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Days before expiry at which an allowed license is reported as expiring.
pub const EXPIRING_SOON_DAYS: u32 = 7;

/// Status a validation can report. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Bound to this device and app (or bound just now).
    Available,
    /// Bound to a different device.
    InUseByOtherDevice,
    /// Bound to this device, but for a different application.
    InUseByOtherApp,
    /// Expiry date is in the past.
    Expired,
    /// Available, but expires within the warning window.
    ExpiringSoon,
    /// Blacklisted by an operator.
    Blacklisted,
    /// The authority does not list the token as live.
    Unregistered,
    /// No authoritative answer and no usable cached state.
    AuthorityUnreachable,
}

impl LicenseStatus {
    /// All variants, in declaration order.
    pub const ALL: [LicenseStatus; 8] = [
        Self::Available,
        Self::InUseByOtherDevice,
        Self::InUseByOtherApp,
        Self::Expired,
        Self::ExpiringSoon,
        Self::Blacklisted,
        Self::Unregistered,
        Self::AuthorityUnreachable,
    ];

    /// Returns true if the host may run.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Available | Self::ExpiringSoon)
    }

    /// Stable machine-readable name (also the persisted form).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InUseByOtherDevice => "in_use_by_other_device",
            Self::InUseByOtherApp => "in_use_by_other_app",
            Self::Expired => "expired",
            Self::ExpiringSoon => "expiring_soon",
            Self::Blacklisted => "blacklisted",
            Self::Unregistered => "unregistered",
            Self::AuthorityUnreachable => "authority_unreachable",
        }
    }

    /// Human-readable label for display.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Available => "License active",
            Self::InUseByOtherDevice => "License in use on another device",
            Self::InUseByOtherApp => "License in use by another application",
            Self::Expired => "License expired",
            Self::ExpiringSoon => "License expiring soon",
            Self::Blacklisted => "License blocked",
            Self::Unregistered => "License not registered",
            Self::AuthorityUnreachable => "License server unreachable",
        }
    }

    /// Downgrades `Available` to `ExpiringSoon` inside the warning window.
    /// Any other status is returned unchanged.
    #[must_use]
    pub fn with_expiry_window(self, expiry: NaiveDate, today: NaiveDate, window_days: u32) -> Self {
        if self == Self::Available && is_expiring_soon(expiry, today, window_days) {
            Self::ExpiringSoon
        } else {
            self
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TypeError::InvalidStatus(s.to_string()))
    }
}

/// Why a validation ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// The token was unbound and is now bound to this device.
    Bound,
    /// The token was already bound to this device and app.
    Reactivated,
    Blacklisted,
    Expired,
    OtherDevice,
    OtherApp,
    /// The authority has no record for the token.
    NotFound,
    /// The record exists but was soft-deleted.
    Deleted,
    /// The token string was rejected before any lookup.
    InvalidToken,
    /// Authority unreachable; answer recomputed from the cached state.
    CacheFallback,
    /// Authority unreachable; the cached state belongs to another binding.
    CacheMismatch,
    /// Authority unreachable and nothing cached.
    NoCachedState,
    /// Authority unreachable after logout; an online check is mandatory.
    LoggedOutOffline,
}

impl ReasonCode {
    /// Stable code string, e.g. `OTHER_DEVICE`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bound => "BOUND",
            Self::Reactivated => "REACTIVATED",
            Self::Blacklisted => "BLACKLISTED",
            Self::Expired => "EXPIRED",
            Self::OtherDevice => "OTHER_DEVICE",
            Self::OtherApp => "OTHER_APP",
            Self::NotFound => "NOT_FOUND",
            Self::Deleted => "DELETED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::CacheFallback => "CACHE_FALLBACK",
            Self::CacheMismatch => "CACHE_MISMATCH",
            Self::NoCachedState => "NO_CACHED_STATE",
            Self::LoggedOutOffline => "LOGGED_OUT_OFFLINE",
        }
    }

    fn explanation(&self) -> &'static str {
        match self {
            Self::Bound => "activated on this device",
            Self::Reactivated => "already activated on this device",
            Self::Blacklisted => "blocked by an administrator",
            Self::Expired => "expiry date has passed",
            Self::OtherDevice => "activated on a different device",
            Self::OtherApp => "activated for a different application on this device",
            Self::NotFound => "token is unknown to the license server",
            Self::Deleted => "token was revoked",
            Self::InvalidToken => "token is malformed",
            Self::CacheFallback => "offline, using last known state",
            Self::CacheMismatch => "offline, last known state belongs to another activation",
            Self::NoCachedState => "offline and never validated on this device",
            Self::LoggedOutOffline => "signed out; connect to the license server to continue",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a validation answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// A successful round-trip to the authority.
    Remote,
    /// The local cache, recomputed against the current date.
    Cache,
    /// Neither; the answer is a deny.
    None,
}

/// The identity a device presents when checking a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceClaim<'a> {
    /// Local fingerprint hash.
    pub fingerprint_hash: &'a str,
    /// Local application name.
    pub app_name: &'a str,
}

/// The authoritative standing of a record on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing<'a> {
    /// Soft-deleted; no longer a live license.
    Deleted,
    /// Blacklisted; overrides expiry and binding.
    Blacklisted,
    /// Not blacklisted, but past its expiry date.
    Expired,
    /// Live and unbound.
    Unbound,
    /// Live and bound.
    Bound(&'a Binding),
}

/// Outcome of resolving a standing against a device claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The record is live and unbound; the device should bind it.
    NeedsBinding,
    /// Terminal status for this device.
    Decided {
        status: LicenseStatus,
        reason: ReasonCode,
    },
}

impl<'a> Standing<'a> {
    /// Applies the fixed precedence to a record's raw fields.
    #[must_use]
    pub fn of(record: &'a LicenseRecord, today: NaiveDate) -> Self {
        if record.deleted {
            Self::Deleted
        } else if record.blacklisted {
            Self::Blacklisted
        } else if record.expiry_date < today {
            Self::Expired
        } else {
            match &record.binding {
                None => Self::Unbound,
                Some(binding) => Self::Bound(binding),
            }
        }
    }

    /// Resolves this standing for the device presenting `claim`.
    ///
    /// Binding equality is judged only from the binding the authority
    /// reported; nothing local can vouch for it.
    #[must_use]
    pub fn resolve_for(&self, claim: DeviceClaim<'_>) -> Resolution {
        let (status, reason) = match self {
            Self::Deleted => (LicenseStatus::Unregistered, ReasonCode::Deleted),
            Self::Blacklisted => (LicenseStatus::Blacklisted, ReasonCode::Blacklisted),
            Self::Expired => (LicenseStatus::Expired, ReasonCode::Expired),
            Self::Unbound => return Resolution::NeedsBinding,
            Self::Bound(binding) => {
                if binding.fingerprint_hash != claim.fingerprint_hash {
                    (LicenseStatus::InUseByOtherDevice, ReasonCode::OtherDevice)
                } else if binding.app_name != claim.app_name {
                    (LicenseStatus::InUseByOtherApp, ReasonCode::OtherApp)
                } else {
                    (LicenseStatus::Available, ReasonCode::Reactivated)
                }
            }
        };
        Resolution::Decided { status, reason }
    }
}

/// Returns true if `expiry` falls within `window_days` of `today`
/// (inclusive on both ends; already-expired dates are not "soon").
#[must_use]
pub fn is_expiring_soon(expiry: NaiveDate, today: NaiveDate, window_days: u32) -> bool {
    let days = (expiry - today).num_days();
    (0..=i64::from(window_days)).contains(&days)
}

/// Whole days from `today` until `expiry`, clamped at zero.
#[must_use]
pub fn remaining_days(expiry: NaiveDate, today: NaiveDate) -> u32 {
    u32::try_from((expiry - today).num_days().max(0)).unwrap_or(u32::MAX)
}

/// Allow/deny decision returned to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the host may run.
    pub allowed: bool,
    /// Reported status.
    pub status: LicenseStatus,
    /// Why the status was reached.
    pub reason: ReasonCode,
    /// Days until expiry, never negative. Zero when unknown.
    pub remaining_days: u32,
    /// Where the answer came from.
    pub source: ResultSource,
    /// When the answer was produced.
    pub checked_at: DateTime<Utc>,
}

impl ValidationResult {
    /// Builds a result; `allowed` is derived from `status`.
    #[must_use]
    pub fn new(
        status: LicenseStatus,
        reason: ReasonCode,
        remaining_days: u32,
        source: ResultSource,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            allowed: status.is_allowed(),
            status,
            reason,
            remaining_days,
            source,
            checked_at,
        }
    }

    /// A deny with no authoritative or cached answer behind it.
    #[must_use]
    pub fn unreachable(reason: ReasonCode, checked_at: DateTime<Utc>) -> Self {
        Self::new(
            LicenseStatus::AuthorityUnreachable,
            reason,
            0,
            ResultSource::None,
            checked_at,
        )
    }

    /// Human-readable one-line status for the host UI.
    #[must_use]
    pub fn message(&self) -> String {
        if self.allowed {
            format!(
                "{}: {} ({} days remaining)",
                self.status.label(),
                self.reason.explanation(),
                self.remaining_days
            )
        } else {
            format!("{}: {}", self.status.label(), self.reason.explanation())
        }
    }
}
