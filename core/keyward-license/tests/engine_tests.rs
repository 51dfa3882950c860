mod common;

use chrono::{TimeDelta, Utc};
use common::{APP, Harness, OTHER_APP, date, today};
use keyward_authority::RemoteAuthority;
use keyward_cache::{CacheEntry, CacheLookup, LocalLicenseCache};
use keyward_license::{EngineConfig, ValidationEngine};
use keyward_types::{
    Binding, Clock, LicenseRecord, LicenseStatus, LicenseToken, ReasonCode, ResultSource,
};
use proptest::prelude::*;
use std::sync::Arc;

// ── Online: binding ──────────────────────────────────────────────

#[tokio::test]
async fn unbound_token_binds_and_is_available() {
    let h = Harness::new();
    let token = h.seed("KW-T1", date(2099, 1, 1));

    let result = h.engine.validate("KW-T1", APP).await;

    assert!(result.allowed);
    assert_eq!(result.status, LicenseStatus::Available);
    assert_eq!(result.reason, ReasonCode::Bound);
    assert_eq!(result.source, ResultSource::Remote);

    let record = h.record(&token);
    assert_eq!(record.bound_fingerprint_hash(), Some(h.hash_for(APP).as_str()));
    assert_eq!(record.bound_app_name(), Some(APP));
    assert_eq!(record.activation_count, 1);
}

#[tokio::test]
async fn same_device_and_app_reactivates_without_state_change() {
    let h = Harness::new();
    let token = h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;

    let result = h.engine.validate("KW-T1", APP).await;

    assert_eq!(result.status, LicenseStatus::Available);
    assert_eq!(result.reason, ReasonCode::Reactivated);
    assert_eq!(h.record(&token).activation_count, 1);
}

#[tokio::test]
async fn scenario_second_app_on_same_machine_is_in_use_by_other_app() {
    let h = Harness::new();
    h.seed("T1", date(2099, 1, 1));

    let first = h.engine.validate("T1", APP).await;
    let second = h.engine.validate("T1", OTHER_APP).await;

    assert_eq!(first.status, LicenseStatus::Available);
    assert_eq!(second.status, LicenseStatus::InUseByOtherApp);
    assert_eq!(second.reason, ReasonCode::OtherApp);
    assert!(!second.allowed);
}

#[tokio::test]
async fn other_machine_is_in_use_by_other_device() {
    let h = Harness::new();
    let token = h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;

    let laptop = h.other_device("laptop-7");
    let result = laptop.validate("KW-T1", APP).await;

    assert_eq!(result.status, LicenseStatus::InUseByOtherDevice);
    assert_eq!(result.reason, ReasonCode::OtherDevice);
    assert_eq!(h.record(&token).bound_app_name(), Some(APP));
    assert_eq!(h.record(&token).activation_count, 1);
}

#[tokio::test]
async fn conflict_from_other_app_keeps_holder_cache() {
    let h = Harness::new();
    let token = h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;
    h.engine.validate("KW-T1", OTHER_APP).await;

    let cached = h.cache.get(&token).unwrap();
    assert_eq!(cached.entry().unwrap().app_name, APP);

    h.authority.set_unreachable(true);
    let offline = h.engine.validate("KW-T1", APP).await;
    assert_eq!(offline.status, LicenseStatus::Available);
    assert_eq!(offline.source, ResultSource::Cache);
}

// ── Online: precedence ───────────────────────────────────────────

#[tokio::test]
async fn blacklist_overrides_valid_binding() {
    let h = Harness::new();
    let token = h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;
    h.authority.set_blacklist(&token, true).await.unwrap();

    let result = h.engine.validate("KW-T1", APP).await;

    assert_eq!(result.status, LicenseStatus::Blacklisted);
    assert_eq!(result.reason, ReasonCode::Blacklisted);
    assert!(!result.allowed);
}

#[tokio::test]
async fn expired_token_is_not_bound() {
    let h = Harness::new();
    let token = h.seed("KW-T2", date(2020, 1, 1));

    let result = h.engine.validate("KW-T2", APP).await;

    assert_eq!(result.status, LicenseStatus::Expired);
    assert_eq!(result.remaining_days, 0);
    assert!(!h.record(&token).is_bound());
}

#[tokio::test]
async fn expiry_day_itself_is_still_valid() {
    let h = Harness::new();
    h.seed("KW-T1", today());

    let result = h.engine.validate("KW-T1", APP).await;

    assert!(result.allowed);
    assert_eq!(result.status, LicenseStatus::ExpiringSoon);
    assert_eq!(result.remaining_days, 0);
}

#[tokio::test]
async fn unknown_token_is_unregistered() {
    let h = Harness::new();

    let result = h.engine.validate("KW-NOBODY", APP).await;

    assert_eq!(result.status, LicenseStatus::Unregistered);
    assert_eq!(result.reason, ReasonCode::NotFound);
    assert_eq!(result.source, ResultSource::Remote);
}

#[tokio::test]
async fn soft_deleted_token_is_unregistered() {
    let h = Harness::new();
    let token = h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;
    h.authority.soft_delete_license(&token).await.unwrap();

    let result = h.engine.validate("KW-T1", APP).await;

    assert_eq!(result.status, LicenseStatus::Unregistered);
    assert_eq!(result.reason, ReasonCode::Deleted);
}

#[tokio::test]
async fn malformed_token_never_reaches_authority() {
    let h = Harness::new();

    let result = h.engine.validate("KW T1; DROP", APP).await;

    assert_eq!(result.reason, ReasonCode::InvalidToken);
    assert_eq!(result.source, ResultSource::None);
    assert!(!result.allowed);
    assert_eq!(h.authority.request_count(), 0);
}

// ── Expiring soon ────────────────────────────────────────────────

#[tokio::test]
async fn seven_days_out_is_expiring_soon() {
    let h = Harness::new();
    h.seed("KW-T1", today() + TimeDelta::days(7));

    let result = h.engine.validate("KW-T1", APP).await;

    assert!(result.allowed);
    assert_eq!(result.status, LicenseStatus::ExpiringSoon);
    assert_eq!(result.reason, ReasonCode::Bound);
    assert_eq!(result.remaining_days, 7);
}

#[tokio::test]
async fn eight_days_out_is_available() {
    let h = Harness::new();
    h.seed("KW-T1", today() + TimeDelta::days(8));

    let result = h.engine.validate("KW-T1", APP).await;

    assert_eq!(result.status, LicenseStatus::Available);
    assert_eq!(result.remaining_days, 8);
}

#[tokio::test]
async fn expiring_window_is_configurable() {
    let h = Harness::with_config(EngineConfig {
        expiring_soon_days: 30,
        ..EngineConfig::default()
    });
    h.seed("KW-T1", today() + TimeDelta::days(20));

    let result = h.engine.validate("KW-T1", APP).await;
    assert_eq!(result.status, LicenseStatus::ExpiringSoon);
}

// ── Persistence ──────────────────────────────────────────────────

#[tokio::test]
async fn online_result_is_cached() {
    let h = Harness::new();
    let token = h.seed("KW-T1", date(2099, 1, 1));

    h.engine.validate("KW-T1", APP).await;

    let CacheLookup::Entry(entry) = h.cache.get(&token).unwrap() else {
        panic!("expected a cache entry");
    };
    assert_eq!(entry.status, LicenseStatus::Available);
    assert_eq!(entry.expiry_date, Some(date(2099, 1, 1)));
    assert_eq!(entry.fingerprint_hash, h.hash_for(APP));
    assert_eq!(entry.app_name, APP);
    assert_eq!(entry.last_checked_at, h.clock.now());
}

#[tokio::test]
async fn not_found_is_cached_without_expiry() {
    let h = Harness::new();
    h.engine.validate("KW-GONE", APP).await;

    let token = LicenseToken::parse("KW-GONE").unwrap();
    let entry = h.cache.get(&token).unwrap().entry().cloned().unwrap();
    assert_eq!(entry.status, LicenseStatus::Unregistered);
    assert_eq!(entry.expiry_date, None);
}

// ── Offline fallback ─────────────────────────────────────────────

#[tokio::test]
async fn offline_uses_cached_available_state() {
    let h = Harness::new();
    h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;
    h.authority.set_unreachable(true);

    let result = h.engine.validate("KW-T1", APP).await;

    assert!(result.allowed);
    assert_eq!(result.status, LicenseStatus::Available);
    assert_eq!(result.reason, ReasonCode::CacheFallback);
    assert_eq!(result.source, ResultSource::Cache);
}

#[tokio::test]
async fn scenario_offline_cached_available_past_expiry_is_expired() {
    let h = Harness::new();
    let token = h.seed("T2", date(2020, 1, 1));
    h.cache
        .put(&CacheEntry {
            token: token.clone(),
            status: LicenseStatus::Available,
            expiry_date: Some(date(2020, 1, 1)),
            fingerprint_hash: h.hash_for(APP),
            app_name: APP.to_string(),
            last_checked_at: Utc::now() - TimeDelta::days(4000),
        })
        .unwrap();
    h.authority.set_unreachable(true);

    let result = h.engine.validate("T2", APP).await;

    assert_eq!(result.status, LicenseStatus::Expired);
    assert!(!result.allowed);
    assert_eq!(result.source, ResultSource::Cache);
    assert_eq!(
        h.cache.get(&token).unwrap().entry().unwrap().status,
        LicenseStatus::Expired
    );
}

#[tokio::test]
async fn offline_date_rollover_expires_cached_license() {
    let h = Harness::new();
    h.seed("KW-T1", today() + TimeDelta::days(2));
    h.engine.validate("KW-T1", APP).await;
    h.authority.set_unreachable(true);

    let before = h.engine.validate("KW-T1", APP).await;
    assert_eq!(before.status, LicenseStatus::ExpiringSoon);
    assert_eq!(before.remaining_days, 2);

    h.clock.advance(TimeDelta::days(3));
    let after = h.engine.validate("KW-T1", APP).await;
    assert_eq!(after.status, LicenseStatus::Expired);
    assert_eq!(after.remaining_days, 0);
}

#[tokio::test]
async fn offline_fallback_keeps_last_checked_at() {
    let h = Harness::new();
    let token = h.seed("KW-T1", today() + TimeDelta::days(2));
    h.engine.validate("KW-T1", APP).await;
    let checked = h.cache.get(&token).unwrap().entry().unwrap().last_checked_at;

    h.authority.set_unreachable(true);
    h.clock.advance(TimeDelta::days(5));
    h.engine.validate("KW-T1", APP).await;

    let entry = h.cache.get(&token).unwrap().entry().cloned().unwrap();
    assert_eq!(entry.status, LicenseStatus::Expired);
    assert_eq!(entry.last_checked_at, checked);
    assert!(h.engine.should_revalidate("KW-T1"));
}

#[tokio::test]
async fn offline_repeats_cached_deny() {
    let h = Harness::new();
    let token = h.seed("KW-T1", date(2099, 1, 1));
    h.authority.set_blacklist(&token, true).await.unwrap();
    h.engine.validate("KW-T1", APP).await;
    h.authority.set_unreachable(true);

    let result = h.engine.validate("KW-T1", APP).await;

    assert_eq!(result.status, LicenseStatus::Blacklisted);
    assert_eq!(result.source, ResultSource::Cache);
}

#[tokio::test]
async fn offline_without_cache_is_unreachable() {
    let h = Harness::new();
    h.seed("KW-T1", date(2099, 1, 1));
    h.authority.set_unreachable(true);

    let result = h.engine.validate("KW-T1", APP).await;

    assert_eq!(result.status, LicenseStatus::AuthorityUnreachable);
    assert_eq!(result.reason, ReasonCode::NoCachedState);
    assert_eq!(result.source, ResultSource::None);
    assert!(!result.allowed);
}

#[tokio::test]
async fn offline_cache_for_other_app_is_not_trusted() {
    let h = Harness::new();
    h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;
    h.authority.set_unreachable(true);

    let result = h.engine.validate("KW-T1", OTHER_APP).await;

    assert_eq!(result.status, LicenseStatus::AuthorityUnreachable);
    assert_eq!(result.reason, ReasonCode::CacheMismatch);
}

#[tokio::test]
async fn offline_cache_from_other_machine_is_not_trusted() {
    let h = Harness::new();
    let token = h.seed("KW-T1", date(2099, 1, 1));
    h.cache
        .put(&CacheEntry {
            token,
            status: LicenseStatus::Available,
            expiry_date: Some(date(2099, 1, 1)),
            fingerprint_hash: "copied-from-elsewhere".into(),
            app_name: APP.into(),
            last_checked_at: Utc::now(),
        })
        .unwrap();
    h.authority.set_unreachable(true);

    let result = h.engine.validate("KW-T1", APP).await;
    assert_eq!(result.reason, ReasonCode::CacheMismatch);
    assert!(!result.allowed);
}

#[tokio::test]
async fn corrupt_cache_entry_forces_remote_answer() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cache.db");
    let h = Harness::new();
    let token = h.seed("KW-T1", date(2099, 1, 1));
    let cache = Arc::new(LocalLicenseCache::open(&path).unwrap());
    let engine = ValidationEngine::new(h.authority.clone(), cache.clone())
        .with_clock(h.clock.clone())
        .with_fingerprinter(h.fingerprinter.clone());
    engine.validate("KW-T1", APP).await;

    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute("UPDATE license_cache SET status = '???'", [])
            .unwrap();
    }
    h.authority.set_unreachable(true);
    let offline = engine.validate("KW-T1", APP).await;
    assert_eq!(offline.reason, ReasonCode::NoCachedState);

    h.authority.set_unreachable(false);
    let online = engine.validate("KW-T1", APP).await;
    assert_eq!(online.status, LicenseStatus::Available);
    assert!(cache.get(&token).unwrap().entry().is_some());
}

// ── Logout ───────────────────────────────────────────────────────

#[tokio::test]
async fn logged_out_token_is_denied_offline() {
    let h = Harness::new();
    h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;

    h.engine.logout("KW-T1").unwrap();
    h.authority.set_unreachable(true);
    let result = h.engine.validate("KW-T1", APP).await;

    assert_eq!(result.status, LicenseStatus::AuthorityUnreachable);
    assert_eq!(result.reason, ReasonCode::LoggedOutOffline);
    assert!(!result.allowed);
}

#[tokio::test]
async fn successful_online_check_lifts_logout() {
    let h = Harness::new();
    h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;
    h.engine.logout("KW-T1").unwrap();

    let online = h.engine.validate("KW-T1", APP).await;
    assert_eq!(online.status, LicenseStatus::Available);
    assert_eq!(online.reason, ReasonCode::Reactivated);

    h.authority.set_unreachable(true);
    let offline = h.engine.validate("KW-T1", APP).await;
    assert_eq!(offline.source, ResultSource::Cache);
    assert!(offline.allowed);
}

#[test]
fn logout_rejects_malformed_token() {
    let h = Harness::new();
    assert!(h.engine.logout("").is_err());
}

// ── Re-validation scheduling ─────────────────────────────────────

#[tokio::test]
async fn should_revalidate_tracks_freshness_window() {
    let h = Harness::new();
    h.seed("KW-T1", date(2099, 1, 1));

    assert!(h.engine.should_revalidate("KW-T1"));
    h.engine.validate("KW-T1", APP).await;
    assert!(!h.engine.should_revalidate("KW-T1"));

    h.clock.advance(TimeDelta::minutes(59));
    assert!(!h.engine.should_revalidate("KW-T1"));

    h.clock.advance(TimeDelta::minutes(1));
    assert!(h.engine.should_revalidate("KW-T1"));
}

#[tokio::test]
async fn wider_freshness_window() {
    let h = Harness::with_config(EngineConfig {
        freshness_window_secs: 24 * 60 * 60,
        ..EngineConfig::default()
    });
    h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;

    h.clock.advance(TimeDelta::hours(23));
    assert!(!h.engine.should_revalidate("KW-T1"));
    h.clock.advance(TimeDelta::hours(1));
    assert!(h.engine.should_revalidate("KW-T1"));
}

#[tokio::test]
async fn should_revalidate_after_logout() {
    let h = Harness::new();
    h.seed("KW-T1", date(2099, 1, 1));
    h.engine.validate("KW-T1", APP).await;
    h.engine.logout("KW-T1").unwrap();

    assert!(h.engine.should_revalidate("KW-T1"));
    assert!(h.engine.should_revalidate("not a token"));
}

// ── Properties ───────────────────────────────────────────────────

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn blacklisted_always_wins(expiry_offset in -400i64..400, bound in 0u8..3) {
        let rt = runtime();
        let status = rt.block_on(async {
            let h = Harness::new();
            let token = h.seed("KW-P1", today() + TimeDelta::days(expiry_offset));
            let mut record: LicenseRecord = h.record(&token);
            record.blacklisted = true;
            record.binding = match bound {
                0 => None,
                1 => Some(binding(&h.hash_for(APP), APP)),
                _ => Some(binding("someone-else", APP)),
            };
            h.authority.insert(record);
            h.engine.validate("KW-P1", APP).await.status
        });
        prop_assert_eq!(status, LicenseStatus::Blacklisted);
    }

    #[test]
    fn past_expiry_always_expired(days_ago in 1i64..3000, bound in 0u8..3) {
        let rt = runtime();
        let status = rt.block_on(async {
            let h = Harness::new();
            let token = h.seed("KW-P2", today() - TimeDelta::days(days_ago));
            let mut record: LicenseRecord = h.record(&token);
            record.binding = match bound {
                0 => None,
                1 => Some(binding(&h.hash_for(APP), APP)),
                _ => Some(binding(&h.hash_for(APP), OTHER_APP)),
            };
            h.authority.insert(record);
            h.engine.validate("KW-P2", APP).await.status
        });
        prop_assert_eq!(status, LicenseStatus::Expired);
    }
}

fn binding(hash: &str, app: &str) -> Binding {
    Binding {
        fingerprint_hash: hash.to_string(),
        app_name: app.to_string(),
        bound_at: Utc::now(),
    }
}
