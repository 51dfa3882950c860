//! Engine configuration.

use chrono::TimeDelta;
use keyward_types::EXPIRING_SOON_DAYS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for [`ValidationEngine`](crate::ValidationEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on each authority call, in seconds.
    pub remote_timeout_secs: u64,
    /// Maximum age of a validation before a fresh remote check is due.
    pub freshness_window_secs: u64,
    /// Days before expiry at which `Available` is reported as `ExpiringSoon`.
    pub expiring_soon_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remote_timeout_secs: 30,
            freshness_window_secs: 60 * 60,
            expiring_soon_days: EXPIRING_SOON_DAYS,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    #[must_use]
    pub fn freshness_window(&self) -> TimeDelta {
        TimeDelta::seconds(i64::try_from(self.freshness_window_secs).unwrap_or(i64::MAX))
    }
}
