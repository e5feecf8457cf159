use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::ClientCacheEntry;
use super::Listener;
use super::LocalFallbackLoader;
use super::NotificationDispatcher;
use crate::ClientConfig;
use crate::GroupKey;

/// Content of one document as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub key: GroupKey,
    pub content: Option<String>,
    pub content_type: String,
}

/// Client cache entries of one agent, keyed by document.
///
/// Entries are created when a listener first subscribes (or on first query)
/// and dropped when their last listener leaves. Every entry synchronizes
/// itself; the map is only locked per shard for lookups and inserts.
///
/// `batch_sizes[i]` counts the entries of long-poll batch `i`. It is only
/// locked inside a shard guard or on its own, never the other way around.
pub struct ClientCacheRegistry {
    config: ClientConfig,
    entries: DashMap<GroupKey, Arc<ClientCacheEntry>>,
    batch_sizes: Mutex<Vec<usize>>,
    loader: Arc<dyn LocalFallbackLoader>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl std::fmt::Debug for ClientCacheRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ClientCacheRegistry")
            .field("agent", &self.config.agent_name)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ClientCacheRegistry {
    pub fn new(
        config: ClientConfig,
        loader: Arc<dyn LocalFallbackLoader>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            batch_sizes: Mutex::new(Vec::new()),
            loader,
            dispatcher,
        }
    }

    pub fn agent(&self) -> &str {
        &self.config.agent_name
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<dyn LocalFallbackLoader> {
        &self.loader
    }

    /// Existing entry for `key`, or a new one seeded from the local store and
    /// assigned to the first long-poll batch with room.
    pub fn get_or_create(
        &self,
        key: &GroupKey,
    ) -> Arc<ClientCacheEntry> {
        if let Some(entry) = self.entries.get(key) {
            return entry.value().clone();
        }

        // Local file IO stays outside the shard lock
        let candidate = Arc::new(ClientCacheEntry::new(
            self.config.agent_name.clone(),
            key.clone(),
            self.loader.as_ref(),
            self.dispatcher.clone(),
        ));

        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| {
                candidate.set_task_id(self.claim_batch_slot());
                candidate.clone()
            })
            .value()
            .clone();

        if Arc::ptr_eq(&entry, &candidate) {
            info!(
                agent = self.agent(),
                data_id = key.data_id(),
                group = key.group(),
                task_id = entry.task_id(),
                "[subscribe] cache entry created"
            );
        }
        entry
    }

    /// Registers `listener` on `key`. Entries that already finished their first
    /// fetch are reconciled right away.
    pub fn add_listener(
        &self,
        key: &GroupKey,
        listener: Arc<dyn Listener>,
    ) -> bool {
        loop {
            let entry = self.get_or_create(key);
            let added = entry.add_listener(listener.clone());

            // The entry may have been evicted between lookup and registration
            if !self.holds(key, &entry) {
                if added {
                    entry.remove_listener(&listener);
                }
                debug!(data_id = key.data_id(), group = key.group(), "entry evicted during subscribe, retrying");
                continue;
            }

            if !entry.is_initializing() {
                entry.check_and_dispatch();
            }
            return added;
        }
    }

    /// Removes `listener` from `key`; the entry is dropped once its last
    /// listener is gone. Entries that never lost a listener here are kept.
    pub fn remove_listener(
        &self,
        key: &GroupKey,
        listener: &Arc<dyn Listener>,
    ) -> bool {
        let entry = match self.get(key) {
            Some(e) => e,
            None => return false,
        };
        if !entry.remove_listener(listener) {
            return false;
        }

        let evicted = self
            .entries
            .remove_if(key, |_, e| Arc::ptr_eq(e, &entry) && !e.has_listeners());
        if let Some((_, e)) = evicted {
            self.release_batch_slot(e.task_id());
            info!(agent = self.agent(), data_id = key.data_id(), group = key.group(), "[unsubscribe] cache entry removed");
        }
        true
    }

    pub fn get(
        &self,
        key: &GroupKey,
    ) -> Option<Arc<ClientCacheEntry>> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn remove(
        &self,
        key: &GroupKey,
    ) -> Option<Arc<ClientCacheEntry>> {
        let (_, entry) = self.entries.remove(key)?;
        self.release_batch_slot(entry.task_id());
        Some(entry)
    }

    fn holds(
        &self,
        key: &GroupKey,
        entry: &Arc<ClientCacheEntry>,
    ) -> bool {
        self.entries.get(key).is_some_and(|e| Arc::ptr_eq(e.value(), entry))
    }

    fn claim_batch_slot(&self) -> usize {
        let mut sizes = self.batch_sizes.lock();
        let per_task_size = self.config.per_task_size;
        match sizes.iter().position(|n| *n < per_task_size) {
            Some(task_id) => {
                sizes[task_id] += 1;
                task_id
            }
            None => {
                sizes.push(1);
                sizes.len() - 1
            }
        }
    }

    fn release_batch_slot(
        &self,
        task_id: usize,
    ) {
        if let Some(n) = self.batch_sizes.lock().get_mut(task_id) {
            *n = n.saturating_sub(1);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<Arc<ClientCacheEntry>> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    pub fn entries_for_task(
        &self,
        task_id: usize,
    ) -> Vec<Arc<ClientCacheEntry>> {
        self.entries
            .iter()
            .filter(|e| e.value().task_id() == task_id)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Number of long-poll batches currently needed
    pub fn task_count(&self) -> usize {
        self.entries.iter().map(|e| e.value().task_id() + 1).max().unwrap_or(0)
    }

    /// Stores fetched content on its entry without notifying. Entries under a
    /// local override keep their override. Returns the updated entry.
    ///
    /// The content type is kept when `change` is a deletion.
    pub fn apply_change(
        &self,
        change: RemoteConfig,
    ) -> Option<Arc<ClientCacheEntry>> {
        let entry = match self.get(&change.key) {
            Some(e) => e,
            None => {
                debug!(data_id = change.key.data_id(), group = change.key.group(), "change for unknown entry ignored");
                return None;
            }
        };

        if entry.is_use_local_override() {
            warn!(
                agent = self.agent(),
                data_id = change.key.data_id(),
                group = change.key.group(),
                "remote change ignored while failover content is in use"
            );
            return None;
        }

        if let Err(e) = self.loader.save_snapshot(self.agent(), &change.key, change.content.as_deref()) {
            error!(data_id = change.key.data_id(), group = change.key.group(), "failed to save snapshot: {}", e);
        }

        // A deletion carries no type; the last known one still drives the diff
        if change.content.is_some() {
            entry.set_content_type(change.content_type);
        }
        entry.set_content(change.content);
        info!(
            agent = self.agent(),
            data_id = change.key.data_id(),
            group = change.key.group(),
            fingerprint = %entry.fingerprint(),
            "[data-received]"
        );
        Some(entry)
    }

    /// Applies a batch of changes, then reconciles each updated entry once
    pub fn reconcile(
        &self,
        changes: Vec<RemoteConfig>,
    ) {
        let updated: Vec<_> = changes.into_iter().filter_map(|c| self.apply_change(c)).collect();
        for entry in updated {
            entry.check_and_dispatch();
            entry.set_initializing(false);
        }
    }

    /// Follows the local failover file of `entry`: switches to it when it
    /// appears, reloads it when modified and drops the override when it is
    /// removed. Returns `true` when the entry's content changed.
    pub fn check_local_config(
        &self,
        entry: &ClientCacheEntry,
    ) -> bool {
        let name = self.agent();
        let key = entry.key();
        let modified = self.loader.failover_last_modified(name, key);

        match (entry.is_use_local_override(), modified) {
            (false, Some(ts)) => {
                let content = self.loader.load_failover(name, key);
                entry.set_use_local_override(true);
                entry.set_local_override_timestamp(ts);
                entry.set_content(content);
                warn!(
                    agent = name,
                    data_id = key.data_id(),
                    group = key.group(),
                    fingerprint = %entry.fingerprint(),
                    "[failover-change] failover file created"
                );
                true
            }
            (true, None) => {
                entry.set_use_local_override(false);
                warn!(agent = name, data_id = key.data_id(), group = key.group(), "[failover-change] failover file deleted");
                false
            }
            (true, Some(ts)) if ts != entry.local_override_timestamp() => {
                let content = self.loader.load_failover(name, key);
                entry.set_local_override_timestamp(ts);
                entry.set_content(content);
                warn!(
                    agent = name,
                    data_id = key.data_id(),
                    group = key.group(),
                    fingerprint = %entry.fingerprint(),
                    "[failover-change] failover file changed"
                );
                true
            }
            _ => false,
        }
    }
}
