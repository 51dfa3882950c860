//! Core type definitions for Keyward.
//!
//! This crate defines the types shared by the device-side validator and the
//! operator-side registry:
//! - License tokens and the authority's license record
//! - The closed status enum a validation can report
//! - The single status-derivation rule (blacklist > expiry > binding)
//! - An injectable clock so date comparisons are testable
//!
//! Both the client path and the admin path derive status through
//! [`Standing::of`], so the two can never disagree about the same record.

mod clock;
mod record;
mod status;
mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use record::{Binding, LicensePatch, LicenseRecord};
pub use status::{
    DeviceClaim, EXPIRING_SOON_DAYS, LicenseStatus, ReasonCode, Resolution, ResultSource, Standing,
    ValidationResult, is_expiring_soon, remaining_days,
};
pub use token::LicenseToken;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, TypeError>;

/// Errors that can occur while parsing core types.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    #[error("invalid license token: {0}")]
    InvalidToken(String),

    #[error("invalid license status: {0}")]
    InvalidStatus(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),
}
