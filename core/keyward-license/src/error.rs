//! Error types for the licensing module.

use keyward_authority::AuthorityError;
use keyward_cache::CacheError;
use std::time::Duration;
use thiserror::Error;

/// Licensing-specific errors.
///
/// `validate` never surfaces these; they fold into a deny result. They are
/// returned from the operations that have no result to fold into, such as
/// logout.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The token string was rejected before any lookup.
    #[error("invalid license token: {0}")]
    InvalidToken(String),

    /// The authority did not answer in time.
    #[error("license server did not answer within {0:?}")]
    Timeout(Duration),

    /// The authority answered with something that cannot be trusted.
    #[error("malformed authority response: {0}")]
    MalformedResponse(String),

    /// Any other authority failure.
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// Local cache failure.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
