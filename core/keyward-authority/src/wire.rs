//! JSON wire format shared by the HTTP client and the reference server.
//!
//! The wire record keeps the binding flat (`bound_fingerprint_hash`,
//! `bound_app_name`, `bound_at`). Every record crosses into typed code through
//! one conversion, [`WireLicense::into_record`]; callers downstream never see
//! raw JSON.

use crate::error::AuthorityError;
use chrono::{DateTime, NaiveDate, Utc};
use keyward_types::{Binding, LicenseRecord, LicenseStatus, LicenseToken};
use serde::{Deserialize, Serialize};

/// A license record as it travels over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLicense {
    pub token: String,
    pub status: String,
    pub created_at: String,
    pub expiry_date: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub blacklisted: bool,
    #[serde(default)]
    pub activation_count: u32,
    #[serde(default)]
    pub bound_fingerprint_hash: Option<String>,
    #[serde(default)]
    pub bound_app_name: Option<String>,
    #[serde(default)]
    pub bound_at: Option<String>,
    #[serde(default)]
    pub last_checked_at: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl WireLicense {
    /// Decodes into a typed record. Any inconsistency is a
    /// [`AuthorityError::MalformedResponse`].
    pub fn into_record(self) -> Result<LicenseRecord, AuthorityError> {
        let token = LicenseToken::parse(&self.token).map_err(malformed)?;
        let status: LicenseStatus = self.status.parse().map_err(malformed)?;
        let created_at = parse_timestamp("created_at", &self.created_at)?;
        let expiry_date = NaiveDate::parse_from_str(&self.expiry_date, "%Y-%m-%d").map_err(|e| {
            AuthorityError::MalformedResponse(format!(
                "expiry_date {:?}: {e}",
                self.expiry_date
            ))
        })?;
        let last_checked_at = self
            .last_checked_at
            .as_deref()
            .map(|s| parse_timestamp("last_checked_at", s))
            .transpose()?;

        let binding = match (self.bound_fingerprint_hash, self.bound_app_name) {
            (None, None) => None,
            (Some(fingerprint_hash), Some(app_name)) => {
                if fingerprint_hash.is_empty() {
                    return Err(AuthorityError::MalformedResponse(format!(
                        "record {token} has an empty bound fingerprint"
                    )));
                }
                let bound_at = match self.bound_at.as_deref() {
                    Some(s) => parse_timestamp("bound_at", s)?,
                    None => created_at,
                };
                Some(Binding {
                    fingerprint_hash,
                    app_name,
                    bound_at,
                })
            }
            _ => {
                return Err(AuthorityError::MalformedResponse(format!(
                    "record {token} has a partial binding"
                )));
            }
        };

        Ok(LicenseRecord {
            token,
            status,
            created_at,
            expiry_date,
            memo: self.memo,
            blacklisted: self.blacklisted,
            activation_count: self.activation_count,
            binding,
            last_checked_at,
            deleted: self.deleted,
        })
    }
}

impl From<&LicenseRecord> for WireLicense {
    fn from(record: &LicenseRecord) -> Self {
        Self {
            token: record.token.to_string(),
            status: record.status.as_str().to_string(),
            created_at: record.created_at.to_rfc3339(),
            expiry_date: record.expiry_date.format("%Y-%m-%d").to_string(),
            memo: record.memo.clone(),
            blacklisted: record.blacklisted,
            activation_count: record.activation_count,
            bound_fingerprint_hash: record.binding.as_ref().map(|b| b.fingerprint_hash.clone()),
            bound_app_name: record.binding.as_ref().map(|b| b.app_name.clone()),
            bound_at: record.binding.as_ref().map(|b| b.bound_at.to_rfc3339()),
            last_checked_at: record.last_checked_at.map(|t| t.to_rfc3339()),
            deleted: record.deleted,
        }
    }
}

/// Body of `POST /api/v1/licenses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLicenseRequest {
    pub expiry_date: NaiveDate,
    #[serde(default)]
    pub memo: String,
}

/// Answer to `POST /api/v1/licenses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLicenseResponse {
    pub token: String,
}

/// Body of `PUT /api/v1/licenses/{token}/blacklist`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistRequest {
    pub blacklisted: bool,
}

/// Body of `POST /api/v1/licenses/{token}/bind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindRequest {
    pub fingerprint_hash: String,
    pub app_name: String,
}

/// Machine-readable code the authority sends with a 404 for an unknown token.
pub const NOT_FOUND_CODE: &str = "not_found";

/// Error body returned by the reference server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
        }
    }

    /// The answer for a token the authority has no record of.
    pub fn not_found(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: Some(NOT_FOUND_CODE.to_string()),
        }
    }

    /// Returns true if this body says the token does not exist, as opposed
    /// to a 404 from something in front of the authority.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code.as_deref() == Some(NOT_FOUND_CODE)
    }
}

fn malformed(e: impl std::fmt::Display) -> AuthorityError {
    AuthorityError::MalformedResponse(e.to_string())
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, AuthorityError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AuthorityError::MalformedResponse(format!("{field} {value:?}: {e}")))
}
