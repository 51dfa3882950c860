//! Operator registry.
//!
//! Every mutation goes to the authority first; the mirror is only updated
//! from what the authority answers afterwards. Nothing here decides whether
//! a device may run.

use crate::error::{AdminError, AdminResult};
use crate::mirror::RegistryMirror;
use crate::view::{RegistryEntry, RegistrySummary};
use chrono::{DateTime, NaiveDate, Utc};
use keyward_authority::RemoteAuthority;
use keyward_types::{Clock, EXPIRING_SOON_DAYS, LicensePatch, LicenseToken};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Registry display settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Days before expiry a live record shows as expiring soon.
    pub expiring_soon_days: u32,
    /// Show soft-deleted records in listings, searches and exports.
    pub include_deleted: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            expiring_soon_days: EXPIRING_SOON_DAYS,
            include_deleted: false,
        }
    }
}

/// Operator-side view of the authority's licenses.
pub struct AdminRegistry {
    authority: Arc<dyn RemoteAuthority>,
    clock: Arc<dyn Clock>,
    config: RwLock<RegistryConfig>,
    mirror: RwLock<RegistryMirror>,
}

impl AdminRegistry {
    pub fn new(authority: Arc<dyn RemoteAuthority>, clock: Arc<dyn Clock>) -> Self {
        Self {
            authority,
            clock,
            config: RwLock::new(RegistryConfig::default()),
            mirror: RwLock::new(RegistryMirror::default()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = RwLock::new(config);
        self
    }

    pub async fn config(&self) -> RegistryConfig {
        self.config.read().await.clone()
    }

    /// Shows or hides soft-deleted records in subsequent reads.
    pub async fn set_include_deleted(&self, include: bool) {
        self.config.write().await.include_deleted = include;
    }

    /// Issues a new, unbound license.
    pub async fn create(&self, expiry_date: NaiveDate, memo: &str) -> AdminResult<LicenseToken> {
        let today = self.clock.today();
        if expiry_date < today {
            return Err(AdminError::ExpiryInPast {
                expiry: expiry_date,
                today,
            });
        }
        let token = self.authority.create_license(expiry_date, memo.trim()).await?;
        info!("created license {token} expiring {expiry_date}");
        self.reload(&token).await?;
        Ok(token)
    }

    /// Re-lists every license from the authority and replaces the mirror.
    pub async fn refresh(&self) -> AdminResult<Vec<RegistryEntry>> {
        let records = self.authority.list_licenses().await?;
        let today = self.clock.today();
        let window = self.config.read().await.expiring_soon_days;
        let rows = records
            .into_iter()
            .map(|record| RegistryEntry::from_record(record, today, window))
            .collect::<Vec<_>>();
        debug!("refreshed {} licenses from {}", rows.len(), self.authority.name());
        self.mirror.write().await.replace_all(rows, self.clock.now());
        Ok(self.entries().await)
    }

    pub async fn set_blacklist(
        &self,
        token: &LicenseToken,
        blacklisted: bool,
    ) -> AdminResult<RegistryEntry> {
        self.authority.set_blacklist(token, blacklisted).await?;
        info!("license {token} blacklisted={blacklisted}");
        self.reload(token).await
    }

    pub async fn soft_delete(&self, token: &LicenseToken) -> AdminResult<RegistryEntry> {
        self.authority.soft_delete_license(token).await?;
        info!("license {token} deleted");
        self.reload(token).await
    }

    /// Moves the expiry date. A past date is allowed; it expires the license.
    pub async fn edit_expiry(
        &self,
        token: &LicenseToken,
        expiry_date: NaiveDate,
    ) -> AdminResult<RegistryEntry> {
        self.authority
            .patch_license(token, &LicensePatch::expiry(expiry_date))
            .await?;
        info!("license {token} now expires {expiry_date}");
        self.reload(token).await
    }

    /// Rows from the last refresh, oldest first.
    pub async fn entries(&self) -> Vec<RegistryEntry> {
        let include_deleted = self.config.read().await.include_deleted;
        self.mirror.read().await.snapshot(include_deleted)
    }

    /// Rows whose token or memo contains `query`, ignoring case.
    pub async fn find(&self, query: &str) -> Vec<RegistryEntry> {
        self.entries()
            .await
            .into_iter()
            .filter(|e| e.matches(query))
            .collect()
    }

    pub async fn summary(&self) -> RegistrySummary {
        RegistrySummary::of(&self.entries().await)
    }

    /// When the mirror was last replaced by a full listing.
    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.mirror.read().await.refreshed_at()
    }

    /// Writes the visible rows to `path` as JSON and returns how many.
    ///
    /// Writes a sibling temp file and renames it over `path`, so a reader
    /// never sees a partial export.
    pub async fn export_json(&self, path: &Path) -> AdminResult<usize> {
        let rows = self.entries().await;
        let json = serde_json::to_vec_pretty(&rows)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;

        info!("exported {} licenses to {}", rows.len(), path.display());
        Ok(rows.len())
    }

    async fn reload(&self, token: &LicenseToken) -> AdminResult<RegistryEntry> {
        let record = self.authority.get_license(token).await?;
        let window = self.config.read().await.expiring_soon_days;
        let row = RegistryEntry::from_record(record, self.clock.today(), window);
        self.mirror.write().await.upsert(row.clone());
        Ok(row)
    }
}

impl std::fmt::Debug for AdminRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminRegistry")
            .field("authority", &self.authority.name())
            .finish_non_exhaustive()
    }
}
