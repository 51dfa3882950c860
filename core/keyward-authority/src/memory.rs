//! In-process reference authority.
//!
//! Holds records in memory and implements the bind rules exactly: a bind
//! only succeeds on a live, unblacklisted, unexpired, unbound record.
//! Backs the reference server and stands in for a real authority in tests,
//! including simulated outages and latency.

use crate::authority::RemoteAuthority;
use crate::error::{AuthorityError, AuthorityResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use keyward_types::{
    Binding, Clock, LicensePatch, LicenseRecord, LicenseStatus, LicenseToken, Standing,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Memory-backed [`RemoteAuthority`].
#[derive(Debug)]
pub struct InMemoryAuthority {
    records: Mutex<BTreeMap<LicenseToken, LicenseRecord>>,
    clock: Arc<dyn Clock>,
    unreachable: AtomicBool,
    latency_ms: AtomicU64,
    requests: AtomicU64,
}

impl InMemoryAuthority {
    /// Creates an empty authority reading dates from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            clock,
            unreachable: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            requests: AtomicU64::new(0),
        }
    }

    /// Inserts or replaces a record as-is.
    pub fn insert(&self, record: LicenseRecord) {
        self.lock().insert(record.token.clone(), record);
    }

    /// Returns a copy of a stored record without counting as a request.
    #[must_use]
    pub fn record(&self, token: &LicenseToken) -> Option<LicenseRecord> {
        self.lock().get(token).cloned()
    }

    /// Makes every subsequent call fail with a network error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delays every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Number of contract calls served so far, failed ones included.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<LicenseToken, LicenseRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self) -> AuthorityResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AuthorityError::Network("connection refused".to_string()));
        }
        Ok(())
    }

    fn with_record<T>(
        &self,
        token: &LicenseToken,
        f: impl FnOnce(&mut LicenseRecord, NaiveDate) -> T,
    ) -> AuthorityResult<T> {
        let today = self.clock.today();
        let mut records = self.lock();
        let record = records
            .get_mut(token)
            .ok_or_else(|| AuthorityError::NotFound(token.to_string()))?;
        Ok(f(record, today))
    }
}

/// Status written back after each mutation so listings stay readable.
/// Decisions never rely on it; an explicit patch may overwrite it.
fn stored_status(record: &LicenseRecord, today: NaiveDate) -> LicenseStatus {
    match record.standing(today) {
        Standing::Deleted => LicenseStatus::Unregistered,
        Standing::Blacklisted => LicenseStatus::Blacklisted,
        Standing::Expired => LicenseStatus::Expired,
        Standing::Unbound | Standing::Bound(_) => LicenseStatus::Available,
    }
}

#[async_trait]
impl RemoteAuthority for InMemoryAuthority {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn list_licenses(&self) -> AuthorityResult<Vec<LicenseRecord>> {
        self.enter().await?;
        Ok(self.lock().values().cloned().collect())
    }

    async fn get_license(&self, token: &LicenseToken) -> AuthorityResult<LicenseRecord> {
        self.enter().await?;
        self.lock()
            .get(token)
            .cloned()
            .ok_or_else(|| AuthorityError::NotFound(token.to_string()))
    }

    async fn create_license(
        &self,
        expiry_date: NaiveDate,
        memo: &str,
    ) -> AuthorityResult<LicenseToken> {
        self.enter().await?;
        let mut records = self.lock();
        let token = loop {
            let candidate = LicenseToken::generate();
            if !records.contains_key(&candidate) {
                break candidate;
            }
        };
        let record = LicenseRecord::issue(token.clone(), expiry_date, memo, self.clock.now());
        records.insert(token.clone(), record);
        info!("issued license {} (expires {})", token, expiry_date);
        Ok(token)
    }

    async fn patch_license(
        &self,
        token: &LicenseToken,
        patch: &LicensePatch,
    ) -> AuthorityResult<()> {
        self.enter().await?;
        self.with_record(token, |record, today| {
            if let Some(expiry) = patch.expiry_date {
                record.expiry_date = expiry;
                record.status = stored_status(record, today);
            }
            if let Some(status) = patch.status {
                record.status = status;
            }
        })
    }

    async fn set_blacklist(&self, token: &LicenseToken, blacklisted: bool) -> AuthorityResult<()> {
        self.enter().await?;
        self.with_record(token, |record, today| {
            record.blacklisted = blacklisted;
            record.status = stored_status(record, today);
        })?;
        info!("license {} blacklisted={}", token, blacklisted);
        Ok(())
    }

    async fn soft_delete_license(&self, token: &LicenseToken) -> AuthorityResult<()> {
        self.enter().await?;
        self.with_record(token, |record, today| {
            record.deleted = true;
            record.status = stored_status(record, today);
        })?;
        info!("license {} soft-deleted", token);
        Ok(())
    }

    async fn validate_and_bind(
        &self,
        token: &LicenseToken,
        fingerprint_hash: &str,
        app_name: &str,
    ) -> AuthorityResult<LicenseRecord> {
        self.enter().await?;
        let now = self.clock.now();
        self.with_record(token, |record, today| {
            if matches!(record.standing(today), Standing::Unbound) {
                record.binding = Some(Binding {
                    fingerprint_hash: fingerprint_hash.to_string(),
                    app_name: app_name.to_string(),
                    bound_at: now,
                });
                record.activation_count += 1;
                debug!("bound {} for app {}", record.token, app_name);
            }
            record.last_checked_at = Some(now);
            record.status = stored_status(record, today);
            record.clone()
        })
    }
}
