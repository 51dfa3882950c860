//! The remote authority contract.
//!
//! Both the device-side validator and the operator registry talk to the
//! authority only through this trait, and every implementation hands back
//! typed [`LicenseRecord`]s.

use crate::error::AuthorityResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use keyward_types::{LicensePatch, LicenseRecord, LicenseToken};

/// Source of truth for license records.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Lists every record, soft-deleted ones included.
    async fn list_licenses(&self) -> AuthorityResult<Vec<LicenseRecord>>;

    /// Fetches one record. Soft-deleted records are still returned, with
    /// their `deleted` flag set.
    async fn get_license(&self, token: &LicenseToken) -> AuthorityResult<LicenseRecord>;

    /// Issues a new, unbound record and returns its token.
    async fn create_license(&self, expiry_date: NaiveDate, memo: &str)
    -> AuthorityResult<LicenseToken>;

    /// Applies a partial update to the stored status and/or expiry.
    async fn patch_license(&self, token: &LicenseToken, patch: &LicensePatch)
    -> AuthorityResult<()>;

    /// Adds (`true`) or removes (`false`) the blacklist flag.
    async fn set_blacklist(&self, token: &LicenseToken, blacklisted: bool) -> AuthorityResult<()>;

    /// Flags the record deleted. Records are never physically removed.
    async fn soft_delete_license(&self, token: &LicenseToken) -> AuthorityResult<()>;

    /// Binds the token to `(fingerprint_hash, app_name)` if it is live and
    /// unbound, and returns the resulting record.
    ///
    /// Idempotent: repeating the call with the same pair changes neither the
    /// binding nor `activation_count`. A record bound to a different pair is
    /// returned with its existing binding.
    async fn validate_and_bind(
        &self,
        token: &LicenseToken,
        fingerprint_hash: &str,
        app_name: &str,
    ) -> AuthorityResult<LicenseRecord>;
}
