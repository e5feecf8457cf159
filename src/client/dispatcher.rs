//! Listener notification.
//!
//! A delivery resolves the effective content through the filter chain, hands
//! it to the listener and, for change-aware listeners, the diff against what
//! the listener last received. Each delivery is isolated: errors and panics
//! are logged and metered here and never reach the reconciliation loop or
//! sibling listeners. The binding only advances on success, so a failed
//! delivery is retried on the next reconciliation with a fingerprint mismatch.
//!
//! Listeners with an executor get their delivery submitted as a job and the
//! dispatcher returns immediately. Two jobs of the same listener run in
//! submission order only if the executor itself is FIFO (see
//! [`SerialExecutor`](super::SerialExecutor)). On other executors a job that
//! starts after a later one of the same binding is dropped, as is a job that
//! finds another delivery of its binding still running.

use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::binding::listener_id;
use super::ConfigChangeEvent;
use super::ListenerBinding;
use crate::diff::DifferRegistry;
use crate::filter::ConfigFilterChain;
use crate::filter::ConfigResponse;
use crate::metrics::LISTENER_NOTIFY_DURATION_METRIC;
use crate::metrics::LISTENER_NOTIFY_FAILURES;
use crate::DeliveryError;
use crate::DispatchConfig;
use crate::Error;
use crate::GroupKey;
use crate::Result;

pub struct NotificationDispatcher {
    differs: Arc<DifferRegistry>,
    filters: Arc<ConfigFilterChain>,
    config: DispatchConfig,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("differs", &self.differs)
            .field("filters", &self.filters)
            .finish()
    }
}

/// Everything one delivery needs, owned so it can move onto an executor
struct Delivery {
    agent: String,
    key: GroupKey,
    content: Option<String>,
    content_type: String,
    fingerprint: String,
    binding: Arc<ListenerBinding>,
    ticket: u64,
    differs: Arc<DifferRegistry>,
    filters: Arc<ConfigFilterChain>,
    slow_threshold: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        differs: Arc<DifferRegistry>,
        filters: Arc<ConfigFilterChain>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            differs,
            filters,
            config,
        }
    }

    pub fn differs(&self) -> &Arc<DifferRegistry> {
        &self.differs
    }

    pub fn filters(&self) -> &Arc<ConfigFilterChain> {
        &self.filters
    }

    /// Delivers `content` with `fingerprint` to the listener of `binding`.
    /// Never fails from the caller's point of view.
    pub fn notify(
        &self,
        agent: &str,
        key: &GroupKey,
        content: Option<&str>,
        content_type: &str,
        fingerprint: &str,
        binding: &Arc<ListenerBinding>,
    ) {
        let delivery = Delivery {
            agent: agent.to_string(),
            key: key.clone(),
            content: content.map(str::to_string),
            content_type: content_type.to_string(),
            fingerprint: fingerprint.to_string(),
            binding: binding.clone(),
            ticket: binding.next_ticket(),
            differs: self.differs.clone(),
            filters: self.filters.clone(),
            slow_threshold: self.config.slow_listener_threshold(),
        };

        match binding.listener().executor() {
            Some(executor) => {
                let submitted = Instant::now();
                let failed_ctx = (delivery.agent.clone(), delivery.key.clone(), delivery.fingerprint.clone());
                if let Err(e) = executor.execute(Box::new(move || delivery.run())) {
                    let (agent, key, fingerprint) = failed_ctx;
                    report_failure(&agent, &key, &fingerprint, binding, &e);
                }
                info!(
                    agent,
                    data_id = key.data_id(),
                    group = key.group(),
                    fingerprint,
                    listener = listener_id(binding.listener()),
                    "[notify-listener] submitted in {}ms",
                    submitted.elapsed().as_millis()
                );
            }
            None => delivery.run(),
        }
    }
}

impl Delivery {
    fn run(self) {
        let Some(_slot) = self.binding.begin_delivery(self.ticket) else {
            debug!(
                agent = %self.agent,
                data_id = self.key.data_id(),
                group = self.key.group(),
                fingerprint = %self.fingerprint,
                listener = listener_id(self.binding.listener()),
                "[notify-skip] superseded or already in flight"
            );
            return;
        };

        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.deliver()))
            .unwrap_or_else(|payload| Err(DeliveryError::Panicked(panic_message(payload)).into()));
        let elapsed = start.elapsed();

        LISTENER_NOTIFY_DURATION_METRIC
            .with_label_values(&[self.agent.as_str()])
            .observe(elapsed.as_secs_f64() * 1000.0);

        match outcome {
            Ok(()) => {
                self.binding.record_delivery(&self.fingerprint, self.content.as_deref());
                info!(
                    agent = %self.agent,
                    data_id = self.key.data_id(),
                    group = self.key.group(),
                    fingerprint = %self.fingerprint,
                    listener = listener_id(self.binding.listener()),
                    "[notify-ok] time cost={}ms",
                    elapsed.as_millis()
                );
            }
            Err(e) => report_failure(&self.agent, &self.key, &self.fingerprint, &self.binding, &e),
        }

        if elapsed > self.slow_threshold {
            warn!(
                agent = %self.agent,
                data_id = self.key.data_id(),
                group = self.key.group(),
                listener = listener_id(self.binding.listener()),
                "[notify-listener] slow listener took {}ms, consider giving it an executor",
                elapsed.as_millis()
            );
        }
    }

    fn deliver(&self) -> Result<()> {
        let listener = self.binding.listener();

        listener.fill_context(self.key.data_id(), self.key.group());

        let mut response = ConfigResponse {
            tenant: self.key.namespace().to_string(),
            data_id: self.key.data_id().to_string(),
            group: self.key.group().to_string(),
            content: self.content.clone(),
            content_type: self.content_type.clone(),
            encrypted_data_key: None,
        };
        self.filters.do_filter(None, &mut response)?;

        let event = if self.binding.is_change_aware() {
            let last_content = self.binding.last_delivered_content();
            let changes = self
                .differs
                .diff(last_content.as_deref(), self.content.as_deref(), &self.content_type);
            Some(ConfigChangeEvent::new(changes))
        } else {
            None
        };

        listener
            .receive_config_info(response.content.as_deref())
            .map_err(|e| DeliveryError::Listener(e.to_string()))?;

        if let Some(event) = event {
            listener
                .receive_config_change(&event)
                .map_err(|e| DeliveryError::Listener(e.to_string()))?;
        }

        Ok(())
    }
}

fn report_failure(
    agent: &str,
    key: &GroupKey,
    fingerprint: &str,
    binding: &ListenerBinding,
    e: &Error,
) {
    LISTENER_NOTIFY_FAILURES.with_label_values(&[agent]).inc();
    error!(
        agent,
        data_id = key.data_id(),
        group = key.group(),
        fingerprint,
        listener = listener_id(binding.listener()),
        "[notify-error] {}",
        e
    );
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
