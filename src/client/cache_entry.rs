use std::hash::Hash;
use std::hash::Hasher;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;
use tracing::info;

use super::binding::same_listener;
use super::Listener;
use super::ListenerBinding;
use super::LocalFallbackLoader;
use super::NotificationDispatcher;
use crate::constants::CONTENT_TYPE_TEXT;
use crate::constants::LOCAL_OVERRIDE_DISABLED;
use crate::fingerprint::fingerprint;
use crate::GroupKey;

/// Content and its fingerprint, always swapped together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSnapshot {
    pub content: Option<String>,
    pub fingerprint: String,
    pub content_type: String,
}

/// Client-side state of one configuration document: content, fingerprint and
/// the listeners registered on it.
///
/// Content and listener list are both published through `ArcSwap`: readers
/// load a consistent snapshot without blocking, writers replace it wholesale.
/// Dispatch iterates a listener snapshot, so registration on another thread
/// never disturbs a running dispatch.
pub struct ClientCacheEntry {
    name: String,
    key: GroupKey,
    state: ArcSwap<ContentSnapshot>,
    listeners: ArcSwap<Vec<Arc<ListenerBinding>>>,
    use_local_override: AtomicBool,
    local_override_ts: AtomicI64,
    task_id: AtomicUsize,
    initializing: AtomicBool,
    dispatcher: Arc<NotificationDispatcher>,
}

impl std::fmt::Debug for ClientCacheEntry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ClientCacheEntry")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("fingerprint", &self.state.load().fingerprint)
            .field("listeners", &self.listeners.load().len())
            .field("task_id", &self.task_id())
            .finish()
    }
}

impl ClientCacheEntry {
    /// Seeds content from the local failover file, else the local snapshot,
    /// else leaves it absent until the first remote fetch.
    pub fn new(
        name: impl Into<String>,
        key: GroupKey,
        loader: &dyn LocalFallbackLoader,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        let name = name.into();
        let content = loader
            .load_failover(&name, &key)
            .or_else(|| loader.load_snapshot(&name, &key));

        if content.is_some() {
            debug!(agent = %name, data_id = key.data_id(), group = key.group(), "cache content seeded from local store");
        }

        let fingerprint = fingerprint(content.as_deref());
        Self {
            name,
            key,
            state: ArcSwap::from_pointee(ContentSnapshot {
                content,
                fingerprint,
                content_type: CONTENT_TYPE_TEXT.to_string(),
            }),
            listeners: ArcSwap::from_pointee(Vec::new()),
            use_local_override: AtomicBool::new(false),
            local_override_ts: AtomicI64::new(LOCAL_OVERRIDE_DISABLED),
            task_id: AtomicUsize::new(0),
            initializing: AtomicBool::new(true),
            dispatcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn data_id(&self) -> &str {
        self.key.data_id()
    }

    pub fn group(&self) -> &str {
        self.key.group()
    }

    pub fn tenant(&self) -> &str {
        self.key.namespace()
    }

    /// Consistent view of content, fingerprint and content type
    pub fn snapshot(&self) -> Arc<ContentSnapshot> {
        self.state.load_full()
    }

    pub fn content(&self) -> Option<String> {
        self.state.load().content.clone()
    }

    pub fn fingerprint(&self) -> String {
        self.state.load().fingerprint.clone()
    }

    pub fn content_type(&self) -> String {
        self.state.load().content_type.clone()
    }

    /// Stores `content` and its fingerprint as one swap. Does not notify;
    /// call [`ClientCacheEntry::check_and_dispatch`] once updates are applied.
    pub fn set_content(
        &self,
        content: Option<String>,
    ) {
        let fingerprint = fingerprint(content.as_deref());
        self.state.rcu(|current| ContentSnapshot {
            content: content.clone(),
            fingerprint: fingerprint.clone(),
            content_type: current.content_type.clone(),
        });
    }

    pub fn set_content_type(
        &self,
        content_type: impl Into<String>,
    ) {
        let content_type = content_type.into();
        self.state.rcu(|current| ContentSnapshot {
            content: current.content.clone(),
            fingerprint: current.fingerprint.clone(),
            content_type: content_type.clone(),
        });
    }

    /// Registers `listener` seeded with the current fingerprint, so it is only
    /// notified of changes after registration. Returns `false` when the same
    /// listener instance is already registered.
    pub fn add_listener(
        &self,
        listener: Arc<dyn Listener>,
    ) -> bool {
        let current = self.state.load();
        let binding = Arc::new(ListenerBinding::new(
            listener,
            current.fingerprint.clone(),
            current.content.clone(),
        ));

        let mut added = false;
        self.listeners.rcu(|bindings| {
            if bindings.iter().any(|b| b.wraps(binding.listener())) {
                added = false;
                return bindings.clone();
            }
            let mut next: Vec<Arc<ListenerBinding>> = bindings.iter().cloned().collect();
            next.push(binding.clone());
            added = true;
            Arc::new(next)
        });

        if added {
            info!(
                agent = %self.name,
                tenant = self.tenant(),
                data_id = self.data_id(),
                group = self.group(),
                cnt = self.listeners.load().len(),
                "[add-listener] ok"
            );
        }
        added
    }

    /// Removes `listener`; returns `false` when it was not registered
    pub fn remove_listener(
        &self,
        listener: &Arc<dyn Listener>,
    ) -> bool {
        let mut removed = false;
        self.listeners.rcu(|bindings| {
            let next: Vec<Arc<ListenerBinding>> =
                bindings.iter().filter(|b| !b.wraps(listener)).cloned().collect();
            removed = next.len() != bindings.len();
            next
        });

        if removed {
            info!(
                agent = %self.name,
                data_id = self.data_id(),
                group = self.group(),
                cnt = self.listeners.load().len(),
                "[remove-listener] ok"
            );
        }
        removed
    }

    /// Read-only copy of the registered listeners, possibly empty
    pub fn listeners(&self) -> Vec<Arc<dyn Listener>> {
        self.listeners.load().iter().map(|b| b.listener().clone()).collect()
    }

    pub fn bindings(&self) -> Arc<Vec<Arc<ListenerBinding>>> {
        self.listeners.load_full()
    }

    pub fn binding_of(
        &self,
        listener: &Arc<dyn Listener>,
    ) -> Option<Arc<ListenerBinding>> {
        self.listeners
            .load()
            .iter()
            .find(|b| same_listener(b.listener(), listener))
            .cloned()
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.load().is_empty()
    }

    /// Notifies every listener whose last delivered fingerprint differs from
    /// the current one.
    pub fn check_and_dispatch(&self) {
        let current = self.state.load_full();
        let bindings = self.listeners.load_full();
        for binding in bindings.iter() {
            if binding.is_stale(&current.fingerprint) {
                self.dispatcher.notify(
                    &self.name,
                    &self.key,
                    current.content.as_deref(),
                    &current.content_type,
                    &current.fingerprint,
                    binding,
                );
            }
        }
    }

    pub fn is_use_local_override(&self) -> bool {
        self.use_local_override.load(Ordering::Acquire)
    }

    /// Disabling the override also resets its timestamp
    pub fn set_use_local_override(
        &self,
        use_local: bool,
    ) {
        self.use_local_override.store(use_local, Ordering::Release);
        if !use_local {
            self.local_override_ts.store(LOCAL_OVERRIDE_DISABLED, Ordering::Release);
        }
    }

    pub fn local_override_timestamp(&self) -> i64 {
        self.local_override_ts.load(Ordering::Acquire)
    }

    pub fn set_local_override_timestamp(
        &self,
        ts: i64,
    ) {
        self.local_override_ts.store(ts, Ordering::Release);
    }

    pub fn task_id(&self) -> usize {
        self.task_id.load(Ordering::Relaxed)
    }

    pub fn set_task_id(
        &self,
        task_id: usize,
    ) {
        self.task_id.store(task_id, Ordering::Relaxed);
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing.load(Ordering::Acquire)
    }

    pub fn set_initializing(
        &self,
        initializing: bool,
    ) {
        self.initializing.store(initializing, Ordering::Release);
    }
}

/// Two entries are the same cache slot when they name the same document
impl PartialEq for ClientCacheEntry {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.key == other.key
    }
}

impl Eq for ClientCacheEntry {}

impl Hash for ClientCacheEntry {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.key.hash(state);
    }
}
