use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::ServerCacheEntry;
use super::VersionStamp;
use crate::client::ConfigProbe;
use crate::pool::StringPool;
use crate::GroupKey;
use crate::Result;

/// Server cache entries keyed by interned group key.
///
/// Operations lock one entry at a time; nothing here holds an entry lock
/// while touching another entry.
#[derive(Debug, Default)]
pub struct ServerCacheRegistry {
    pool: StringPool,
    entries: DashMap<Arc<str>, Arc<ServerCacheEntry>>,
}

impl ServerCacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &self,
        key: &GroupKey,
    ) -> Arc<ServerCacheEntry> {
        let server_key = key.to_server_key();
        if let Some(entry) = self.entries.get(server_key.as_str()) {
            return entry.value().clone();
        }

        let interned = self.pool.intern(&server_key);
        self.entries
            .entry(interned.clone())
            .or_insert_with(|| Arc::new(ServerCacheEntry::new(interned)))
            .value()
            .clone()
    }

    pub fn get(
        &self,
        key: &GroupKey,
    ) -> Option<Arc<ServerCacheEntry>> {
        self.get_by_server_key(&key.to_server_key())
    }

    pub fn get_by_server_key(
        &self,
        server_key: &str,
    ) -> Option<Arc<ServerCacheEntry>> {
        self.entries.get(server_key).map(|e| e.value().clone())
    }

    /// Records a new primary version of `key`. Returns `false` for a stale
    /// timestamp.
    pub fn dump(
        &self,
        key: &GroupKey,
        fingerprint: &str,
        last_modified: i64,
        content_type: &str,
    ) -> bool {
        self.get_or_create(key)
            .publish_with_type(fingerprint, last_modified, content_type)
    }

    pub fn dump_beta(
        &self,
        key: &GroupKey,
        fingerprint: &str,
        last_modified: i64,
        target_ips: HashSet<String>,
    ) -> bool {
        self.get_or_create(key).publish_beta(fingerprint, last_modified, target_ips)
    }

    pub fn stop_beta(
        &self,
        key: &GroupKey,
    ) -> bool {
        self.get(key).map(|e| e.stop_beta()).unwrap_or(false)
    }

    pub fn dump_tag(
        &self,
        key: &GroupKey,
        tag: &str,
        fingerprint: &str,
        last_modified: i64,
    ) -> Result<bool> {
        self.get_or_create(key).publish_tag(tag, fingerprint, last_modified)
    }

    pub fn remove_tag(
        &self,
        key: &GroupKey,
        tag: &str,
    ) -> bool {
        self.get(key).map(|e| e.remove_tag(tag)).unwrap_or(false)
    }

    /// Evicts `key` once its persisted record is gone
    pub fn remove(
        &self,
        key: &GroupKey,
    ) -> bool {
        let server_key = key.to_server_key();
        let removed = self.entries.remove(server_key.as_str()).is_some();
        if removed {
            self.pool.remove(&server_key);
            info!(group_key = %server_key, "[dump] cache entry removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pair served to `client_ip` for `key`; unknown keys resolve to the
    /// fingerprint of absent content.
    pub fn resolve_for(
        &self,
        key: &GroupKey,
        client_ip: &str,
        tag: Option<&str>,
    ) -> VersionStamp {
        self.get(key)
            .map(|e| e.resolve_for(client_ip, tag))
            .unwrap_or_default()
    }

    pub fn is_up_to_date(
        &self,
        key: &GroupKey,
        client_fingerprint: &str,
        client_ip: &str,
        tag: Option<&str>,
    ) -> bool {
        self.resolve_for(key, client_ip, tag).fingerprint == client_fingerprint
    }

    /// Keys whose served fingerprint differs from the probed one, in probe order
    pub fn compare_fingerprints(
        &self,
        client_ip: &str,
        tag: Option<&str>,
        probes: &[ConfigProbe],
    ) -> Vec<GroupKey> {
        probes
            .iter()
            .filter(|p| !self.is_up_to_date(&p.key, &p.fingerprint, client_ip, tag))
            .map(|p| p.key.clone())
            .collect()
    }
}
