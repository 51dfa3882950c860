//! Local copy of the last listing, for fast display and export only.

use crate::view::RegistryEntry;
use chrono::{DateTime, Utc};
use keyward_types::LicenseToken;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub(crate) struct RegistryMirror {
    entries: BTreeMap<LicenseToken, RegistryEntry>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl RegistryMirror {
    pub(crate) fn replace_all(&mut self, entries: Vec<RegistryEntry>, at: DateTime<Utc>) {
        self.entries = entries
            .into_iter()
            .map(|e| (e.token().clone(), e))
            .collect();
        self.refreshed_at = Some(at);
    }

    pub(crate) fn upsert(&mut self, entry: RegistryEntry) {
        self.entries.insert(entry.token().clone(), entry);
    }

    pub(crate) fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Rows sorted by creation time, then token.
    pub(crate) fn snapshot(&self, include_deleted: bool) -> Vec<RegistryEntry> {
        let mut rows: Vec<RegistryEntry> = self
            .entries
            .values()
            .filter(|e| include_deleted || !e.record.deleted)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.record
                .created_at
                .cmp(&b.record.created_at)
                .then_with(|| a.record.token.cmp(&b.record.token))
        });
        rows
    }
}
