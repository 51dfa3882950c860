//! Error types for authority access.

use thiserror::Error;

/// Result type for authority operations.
pub type AuthorityResult<T> = Result<T, AuthorityError>;

/// Errors returned by a [`RemoteAuthority`](crate::RemoteAuthority).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The request did not complete within the configured timeout.
    #[error("authority request timed out")]
    Timeout,

    /// Connection refused, DNS failure, TLS failure and the like.
    #[error("network error: {0}")]
    Network(String),

    /// The authority answered with something that is not a license record.
    #[error("malformed authority response: {0}")]
    MalformedResponse(String),

    /// The authority has no record for the token.
    #[error("license not found: {0}")]
    NotFound(String),

    /// Any other non-success answer.
    #[error("authority rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The client could not be constructed.
    #[error("configuration error: {0}")]
    Config(String),
}
