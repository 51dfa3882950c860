//! Error types for the registry.

use chrono::NaiveDate;
use keyward_authority::AuthorityError;
use thiserror::Error;

/// Result type for registry operations.
pub type AdminResult<T> = Result<T, AdminError>;

/// Errors returned by [`AdminRegistry`](crate::AdminRegistry).
#[derive(Debug, Error)]
pub enum AdminError {
    /// The authority refused or could not be reached.
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// An expiry date before today was given for a new license.
    #[error("expiry date {expiry} is before today ({today})")]
    ExpiryInPast { expiry: NaiveDate, today: NaiveDate },

    /// Export failed while writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Export failed while encoding.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
