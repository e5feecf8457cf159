use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::MutexGuard;

use super::Listener;

#[derive(Debug, Clone)]
struct DeliveryState {
    fingerprint: String,
    content: Option<String>,
}

/// A listener registered on one cache entry, with what it was last given.
///
/// Every dispatch takes a ticket. Deliveries of one binding run one at a
/// time and never behind a later ticket, so the recorded fingerprint is
/// always the one the listener saw last.
///
/// Two bindings are equal when they wrap the same listener instance.
pub struct ListenerBinding {
    listener: Arc<dyn Listener>,
    change_aware: bool,
    delivered: Mutex<DeliveryState>,
    tickets: AtomicU64,
    /// Highest ticket that started delivering
    in_flight: Mutex<u64>,
}

impl std::fmt::Debug for ListenerBinding {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ListenerBinding")
            .field("listener", &listener_id(&self.listener))
            .field("change_aware", &self.change_aware)
            .field("last_delivered_fingerprint", &self.delivered.lock().fingerprint)
            .finish()
    }
}

impl ListenerBinding {
    /// Change-aware listeners are seeded with content too, so their first
    /// change event diffs against what the entry held at registration.
    pub(crate) fn new(
        listener: Arc<dyn Listener>,
        fingerprint: String,
        content: Option<String>,
    ) -> Self {
        let change_aware = listener.is_change_aware();
        let content = if change_aware { content } else { None };
        Self {
            listener,
            change_aware,
            delivered: Mutex::new(DeliveryState { fingerprint, content }),
            tickets: AtomicU64::new(0),
            in_flight: Mutex::new(0),
        }
    }

    pub fn listener(&self) -> &Arc<dyn Listener> {
        &self.listener
    }

    pub fn is_change_aware(&self) -> bool {
        self.change_aware
    }

    pub fn last_delivered_fingerprint(&self) -> String {
        self.delivered.lock().fingerprint.clone()
    }

    pub fn last_delivered_content(&self) -> Option<String> {
        self.delivered.lock().content.clone()
    }

    pub(crate) fn is_stale(
        &self,
        fingerprint: &str,
    ) -> bool {
        self.delivered.lock().fingerprint != fingerprint
    }

    pub(crate) fn wraps(
        &self,
        listener: &Arc<dyn Listener>,
    ) -> bool {
        same_listener(&self.listener, listener)
    }

    pub(crate) fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Claims the delivery slot for `ticket`. `None` when another delivery of
    /// this binding is running or a later ticket already started; the binding
    /// then keeps the older fingerprint and the next reconciliation catches up.
    pub(crate) fn begin_delivery(
        &self,
        ticket: u64,
    ) -> Option<MutexGuard<'_, u64>> {
        let mut latest = self.in_flight.try_lock()?;
        if *latest > ticket {
            return None;
        }
        *latest = ticket;
        Some(latest)
    }

    /// Success path only: a failed delivery leaves the old fingerprint so the
    /// next reconciliation retries it.
    pub(crate) fn record_delivery(
        &self,
        fingerprint: &str,
        content: Option<&str>,
    ) {
        let mut delivered = self.delivered.lock();
        delivered.fingerprint = fingerprint.to_string();
        if self.change_aware {
            delivered.content = content.map(str::to_string);
        }
    }
}

impl PartialEq for ListenerBinding {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        same_listener(&self.listener, &other.listener)
    }
}

impl Eq for ListenerBinding {}

/// Listener identity is the identity of the shared instance
pub(crate) fn same_listener(
    a: &Arc<dyn Listener>,
    b: &Arc<dyn Listener>,
) -> bool {
    listener_id(a) == listener_id(b)
}

pub(crate) fn listener_id(listener: &Arc<dyn Listener>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}
