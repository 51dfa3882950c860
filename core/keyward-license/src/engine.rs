//! The validation engine.
//!
//! Computes the device fingerprint, asks the authority, derives the status,
//! persists it, and answers allow/deny. When the authority cannot be reached
//! the answer is recomputed from the cache against today's date, unless the
//! token was logged out, in which case only the authority can allow it.
//!
//! `validate` never fails: every error resolves to a deny result.

use crate::config::EngineConfig;
use crate::device::{FingerprintSource, HostFingerprinter};
use crate::error::{LicenseError, LicenseResult};
use crate::flight::SingleFlight;
use chrono::NaiveDate;
use keyward_authority::{AuthorityError, AuthorityResult, RemoteAuthority};
use keyward_cache::{CacheEntry, CacheLookup, LocalLicenseCache};
use keyward_types::{
    Clock, DeviceClaim, LicenseRecord, LicenseStatus, LicenseToken, ReasonCode, Resolution,
    ResultSource, SystemClock, ValidationResult, remaining_days,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the authority said about a token.
enum AuthorityAnswer {
    /// The record, possibly after a bind this call performed.
    Record { record: LicenseRecord, bound_now: bool },
    /// The authority has no such token.
    NotFound,
}

/// Device-side license validator.
pub struct ValidationEngine {
    authority: Arc<dyn RemoteAuthority>,
    cache: Arc<LocalLicenseCache>,
    fingerprinter: Arc<dyn FingerprintSource>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    flights: SingleFlight<LicenseToken, ValidationResult>,
}

impl ValidationEngine {
    /// Creates an engine with the host fingerprinter, the system clock and
    /// default config.
    pub fn new(authority: Arc<dyn RemoteAuthority>, cache: Arc<LocalLicenseCache>) -> Self {
        Self {
            authority,
            cache,
            fingerprinter: Arc::new(HostFingerprinter),
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
            flights: SingleFlight::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_fingerprinter(mut self, fingerprinter: Arc<dyn FingerprintSource>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates `token` for `app_name` on this device.
    ///
    /// Concurrent calls for the same token share one run; a caller for a
    /// different app waits for the running one and then validates itself.
    pub async fn validate(&self, token: &str, app_name: &str) -> ValidationResult {
        let token = match LicenseToken::parse(token) {
            Ok(token) => token,
            Err(e) => {
                warn!("rejecting license token: {e}");
                return ValidationResult::new(
                    LicenseStatus::Unregistered,
                    ReasonCode::InvalidToken,
                    0,
                    ResultSource::None,
                    self.clock.now(),
                );
            }
        };

        self.flights
            .run(token.clone(), app_name, || self.run_validation(&token, app_name))
            .await
    }

    /// Returns true if the last authoritative check for `token` is older
    /// than the freshness window, or there is none.
    pub fn should_revalidate(&self, token: &str) -> bool {
        let Ok(token) = LicenseToken::parse(token) else {
            return true;
        };
        match self.cache.get(&token) {
            Ok(CacheLookup::Entry(entry)) => {
                self.clock.now() - entry.last_checked_at >= self.config.freshness_window()
            }
            Ok(CacheLookup::Absent | CacheLookup::LoggedOut) => true,
            Err(e) => {
                warn!("cache read failed for {token}: {e}");
                true
            }
        }
    }

    /// Forgets the cached state of `token` and requires the next validation
    /// to reach the authority before it can allow.
    pub fn logout(&self, token: &str) -> LicenseResult<()> {
        let token =
            LicenseToken::parse(token).map_err(|e| LicenseError::InvalidToken(e.to_string()))?;
        self.cache.mark_logged_out(&token, self.clock.now())?;
        info!("logged out {token}");
        Ok(())
    }

    async fn run_validation(&self, token: &LicenseToken, app_name: &str) -> ValidationResult {
        let fingerprint = self.fingerprinter.fingerprint(app_name);
        let claim = DeviceClaim {
            fingerprint_hash: fingerprint.hash(),
            app_name,
        };

        let lookup = self.cache.get(token).unwrap_or_else(|e| {
            warn!("cache read failed for {token}: {e}");
            CacheLookup::Absent
        });

        match self.consult_authority(token, claim).await {
            Ok(answer) => self.decide_online(token, claim, answer, &lookup),
            Err(e) => {
                warn!(
                    "authority {} unavailable for {token}: {e}",
                    self.authority.name()
                );
                self.decide_offline(token, claim, lookup)
            }
        }
    }

    /// Single bounded call, never retried.
    async fn call<T>(
        &self,
        request: impl Future<Output = AuthorityResult<T>>,
    ) -> LicenseResult<T> {
        let limit = self.config.remote_timeout();
        match tokio::time::timeout(limit, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(AuthorityError::MalformedResponse(m))) => {
                Err(LicenseError::MalformedResponse(m))
            }
            Ok(Err(e)) => Err(LicenseError::Authority(e)),
            Err(_) => Err(LicenseError::Timeout(limit)),
        }
    }

    async fn consult_authority(
        &self,
        token: &LicenseToken,
        claim: DeviceClaim<'_>,
    ) -> LicenseResult<AuthorityAnswer> {
        let today = self.clock.today();
        let record = match self.call(self.authority.get_license(token)).await {
            Ok(record) => record,
            Err(LicenseError::Authority(AuthorityError::NotFound(_))) => {
                return Ok(AuthorityAnswer::NotFound);
            }
            Err(e) => return Err(e),
        };
        check_identity(token, &record)?;

        if record.standing(today).resolve_for(claim) != Resolution::NeedsBinding {
            return Ok(AuthorityAnswer::Record {
                record,
                bound_now: false,
            });
        }

        debug!("binding {token} for app {}", claim.app_name);
        let bound = match self
            .call(
                self.authority
                    .validate_and_bind(token, claim.fingerprint_hash, claim.app_name),
            )
            .await
        {
            Ok(record) => record,
            Err(LicenseError::Authority(AuthorityError::NotFound(_))) => {
                return Ok(AuthorityAnswer::NotFound);
            }
            Err(e) => return Err(e),
        };
        check_identity(token, &bound)?;

        // A live record that is still unbound after a bind means the
        // authority did not do what it answered for.
        if bound.standing(today).resolve_for(claim) == Resolution::NeedsBinding {
            return Err(LicenseError::MalformedResponse(format!(
                "bind of {token} returned an unbound record"
            )));
        }

        Ok(AuthorityAnswer::Record {
            record: bound,
            bound_now: true,
        })
    }

    fn decide_online(
        &self,
        token: &LicenseToken,
        claim: DeviceClaim<'_>,
        answer: AuthorityAnswer,
        cached: &CacheLookup,
    ) -> ValidationResult {
        let now = self.clock.now();
        let today = self.clock.today();

        let (status, reason, expiry_date) = match answer {
            AuthorityAnswer::NotFound => {
                (LicenseStatus::Unregistered, ReasonCode::NotFound, None)
            }
            AuthorityAnswer::Record { record, bound_now } => {
                let (status, reason) = match record.standing(today).resolve_for(claim) {
                    Resolution::Decided { status, reason } => (status, reason),
                    // Ruled out by consult_authority.
                    Resolution::NeedsBinding => {
                        (LicenseStatus::Unregistered, ReasonCode::NotFound)
                    }
                };
                let reason = if bound_now && reason == ReasonCode::Reactivated {
                    ReasonCode::Bound
                } else {
                    reason
                };
                let status = status.with_expiry_window(
                    record.expiry_date,
                    today,
                    self.config.expiring_soon_days,
                );
                (status, reason, Some(record.expiry_date))
            }
        };

        let result = ValidationResult::new(
            status,
            reason,
            days_left(expiry_date, today),
            ResultSource::Remote,
            now,
        );

        // A conflict seen by another app must not evict the state cached
        // for the activation that actually holds the token.
        let held_elsewhere = matches!(
            status,
            LicenseStatus::InUseByOtherApp | LicenseStatus::InUseByOtherDevice
        ) && cached
            .entry()
            .is_some_and(|e| !e.belongs_to(claim.fingerprint_hash, claim.app_name));

        if held_elsewhere {
            debug!("keeping cached state of the holding activation for {token}");
        } else {
            self.persist(&CacheEntry {
                token: token.clone(),
                status,
                expiry_date,
                fingerprint_hash: claim.fingerprint_hash.to_string(),
                app_name: claim.app_name.to_string(),
                last_checked_at: now,
            });
        }

        info!("validated {token}: {status} ({reason})");
        result
    }

    fn decide_offline(
        &self,
        token: &LicenseToken,
        claim: DeviceClaim<'_>,
        lookup: CacheLookup,
    ) -> ValidationResult {
        let now = self.clock.now();
        let today = self.clock.today();

        let entry = match lookup {
            CacheLookup::LoggedOut => {
                return ValidationResult::unreachable(ReasonCode::LoggedOutOffline, now);
            }
            CacheLookup::Absent => {
                return ValidationResult::unreachable(ReasonCode::NoCachedState, now);
            }
            CacheLookup::Entry(entry) => entry,
        };

        // The cache can only deny on its own; it never vouches for a
        // binding it was not written under.
        if !entry.belongs_to(claim.fingerprint_hash, claim.app_name) {
            warn!("cached state for {token} belongs to another activation");
            return ValidationResult::unreachable(ReasonCode::CacheMismatch, now);
        }

        let (status, reason) = if entry.status.is_allowed() {
            match entry.expiry_date {
                None => return ValidationResult::unreachable(ReasonCode::NoCachedState, now),
                Some(expiry) if expiry < today => (LicenseStatus::Expired, ReasonCode::Expired),
                Some(expiry) => (
                    LicenseStatus::Available.with_expiry_window(
                        expiry,
                        today,
                        self.config.expiring_soon_days,
                    ),
                    ReasonCode::CacheFallback,
                ),
            }
        } else {
            (entry.status, ReasonCode::CacheFallback)
        };

        if status != entry.status {
            // Keep last_checked_at: the authority was not consulted.
            self.persist(&CacheEntry { status, ..entry.clone() });
        }

        warn!("using cached state for {token}: {status} ({reason})");
        ValidationResult::new(
            status,
            reason,
            days_left(entry.expiry_date, today),
            ResultSource::Cache,
            now,
        )
    }

    /// One atomic write; a failure only costs offline tolerance.
    fn persist(&self, entry: &CacheEntry) {
        if let Err(e) = self.cache.put(entry) {
            warn!("failed to cache state for {}: {e}", entry.token);
        }
    }
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("authority", &self.authority.name())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

fn check_identity(token: &LicenseToken, record: &LicenseRecord) -> LicenseResult<()> {
    if &record.token == token {
        Ok(())
    } else {
        Err(LicenseError::MalformedResponse(format!(
            "asked for {token}, authority answered for {}",
            record.token
        )))
    }
}

fn days_left(expiry: Option<NaiveDate>, today: NaiveDate) -> u32 {
    expiry.map_or(0, |expiry| remaining_days(expiry, today))
}
