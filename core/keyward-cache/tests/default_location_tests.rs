//! Runs in its own test binary: it points `XDG_DATA_HOME` at a temp dir,
//! which is process-wide state.

#![cfg(target_os = "linux")]

use chrono::{NaiveDate, TimeZone, Utc};
use keyward_cache::{CacheEntry, DEFAULT_CACHE_FILE, LocalLicenseCache};
use keyward_types::{LicenseStatus, LicenseToken};

#[test]
fn open_default_uses_the_local_data_dir() {
    let data_home = tempfile::tempdir().unwrap();
    // SAFETY: the only test in this binary, so no other thread reads the
    // environment concurrently.
    unsafe {
        std::env::set_var("XDG_DATA_HOME", data_home.path());
    }

    let expected = data_home.path().join("keyward").join(DEFAULT_CACHE_FILE);
    let token = LicenseToken::parse("KW-DEFAULT").unwrap();

    {
        let cache = LocalLicenseCache::open_default("keyward").unwrap();
        assert_eq!(cache.path(), Some(expected.as_path()));
        assert!(expected.exists());

        cache
            .put(&CacheEntry {
                token: token.clone(),
                status: LicenseStatus::Available,
                expiry_date: NaiveDate::from_ymd_opt(2030, 12, 31),
                fingerprint_hash: "abc123".into(),
                app_name: "Writer".into(),
                last_checked_at: Utc.with_ymd_and_hms(2030, 3, 1, 9, 30, 0).unwrap(),
            })
            .unwrap();
    }

    let reopened = LocalLicenseCache::open_default("keyward").unwrap();
    let entry = reopened.get(&token).unwrap().entry().cloned().unwrap();
    assert_eq!(entry.status, LicenseStatus::Available);
}
