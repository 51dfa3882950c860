//! Shared test helpers for validation tests.

#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use keyward_authority::InMemoryAuthority;
use keyward_cache::LocalLicenseCache;
use keyward_license::{
    DeviceInfo, EngineConfig, FingerprintSource, StaticFingerprinter, ValidationEngine,
};
use keyward_types::{LicenseRecord, LicenseToken, ManualClock};
use std::sync::Arc;

pub const APP: &str = "Writer";
pub const OTHER_APP: &str = "Reader";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The date every harness clock starts on.
pub fn today() -> NaiveDate {
    date(2030, 6, 1)
}

pub fn device(hostname: &str) -> DeviceInfo {
    DeviceInfo {
        hostname: hostname.to_string(),
        mac_address: "02:42:ac:11:00:02".to_string(),
        hardware_model: "ThinkPad X1".to_string(),
        os_name: "Linux".to_string(),
        os_version: "6.8".to_string(),
        cpu_brand: "Intel(R) Core(TM) i7".to_string(),
        total_memory: "17179869184".to_string(),
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub authority: Arc<InMemoryAuthority>,
    pub cache: Arc<LocalLicenseCache>,
    pub fingerprinter: Arc<StaticFingerprinter>,
    pub engine: ValidationEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::at_date(today()));
        let authority = Arc::new(InMemoryAuthority::new(clock.clone()));
        let cache = Arc::new(LocalLicenseCache::open_in_memory().unwrap());
        let fingerprinter = Arc::new(StaticFingerprinter::new(device("workstation-1")));
        let engine = ValidationEngine::new(authority.clone(), cache.clone())
            .with_clock(clock.clone())
            .with_fingerprinter(fingerprinter.clone())
            .with_config(config);
        Self {
            clock,
            authority,
            cache,
            fingerprinter,
            engine,
        }
    }

    /// An engine on another machine talking to the same authority.
    pub fn other_device(&self, hostname: &str) -> ValidationEngine {
        ValidationEngine::new(
            self.authority.clone(),
            Arc::new(LocalLicenseCache::open_in_memory().unwrap()),
        )
        .with_clock(self.clock.clone())
        .with_fingerprinter(Arc::new(StaticFingerprinter::new(device(hostname))))
    }

    /// Fingerprint hash this harness's device presents for `app`.
    pub fn hash_for(&self, app: &str) -> String {
        self.fingerprinter.fingerprint(app).hash().to_string()
    }

    /// Stores an unbound record expiring on `expiry`.
    pub fn seed(&self, token: &str, expiry: NaiveDate) -> LicenseToken {
        let token = LicenseToken::parse(token).unwrap();
        self.authority
            .insert(LicenseRecord::issue(token.clone(), expiry, "", Utc::now()));
        token
    }

    pub fn record(&self, token: &LicenseToken) -> LicenseRecord {
        self.authority.record(token).unwrap()
    }
}
