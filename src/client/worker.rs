//! Long-poll reconciliation.
//!
//! Entries are split into batches of `per_task_size` by their task id. Each
//! batch runs its own loop: follow local failover files, ask the transport
//! which documents changed, fetch those, store them and finally sweep the
//! batch so every listener behind the current fingerprint is notified once.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
#[cfg(test)]
use mockall::automock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::ClientCacheRegistry;
use super::RemoteConfig;
use crate::ClientConfig;
use crate::Error;
use crate::GroupKey;
use crate::Result;

/// What the client currently holds for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigProbe {
    pub key: GroupKey,
    pub fingerprint: String,
}

/// Remote side of the long poll
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigTransport: Send + Sync + 'static {
    /// Keys whose server fingerprint differs from the probed one.
    /// `has_initializing` asks the server to answer without holding the poll.
    async fn check_updates(
        &self,
        probes: Vec<ConfigProbe>,
        has_initializing: bool,
    ) -> Result<Vec<GroupKey>>;

    async fn fetch(
        &self,
        key: &GroupKey,
    ) -> Result<RemoteConfig>;
}

pub struct ReconcileWorker {
    registry: Arc<ClientCacheRegistry>,
    transport: Arc<dyn ConfigTransport>,
    config: ClientConfig,
}

impl std::fmt::Debug for ReconcileWorker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ReconcileWorker").field("registry", &self.registry).finish()
    }
}

impl ReconcileWorker {
    pub fn new(
        registry: Arc<ClientCacheRegistry>,
        transport: Arc<dyn ConfigTransport>,
    ) -> Self {
        let config = registry.config().clone();
        Self {
            registry,
            transport,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ClientCacheRegistry> {
        &self.registry
    }

    /// One reconciliation cycle of batch `task_id`. Returns how many remote
    /// changes were stored.
    pub async fn run_once(
        &self,
        task_id: usize,
    ) -> Result<usize> {
        let entries = self.registry.entries_for_task(task_id);
        if entries.is_empty() {
            return Ok(0);
        }

        let mut probes = Vec::with_capacity(entries.len());
        let mut has_initializing = false;
        for entry in &entries {
            if self.registry.check_local_config(entry) {
                entry.check_and_dispatch();
            }
            if entry.is_use_local_override() {
                continue;
            }
            has_initializing |= entry.is_initializing();
            probes.push(ConfigProbe {
                key: entry.key().clone(),
                fingerprint: entry.fingerprint(),
            });
        }
        let probed: HashSet<GroupKey> = probes.iter().map(|p| p.key.clone()).collect();

        let changed = if probes.is_empty() {
            Vec::new()
        } else {
            match timeout(
                self.config.fetch_timeout(),
                self.transport.check_updates(probes, has_initializing),
            )
            .await
            {
                Ok(r) => r?,
                Err(_) => {
                    return Err(Error::Transport(format!(
                        "check_updates of task {} timed out after {}ms",
                        task_id, self.config.fetch_timeout_in_ms
                    )))
                }
            }
        };
        debug!(task_id, changed = changed.len(), "long poll answered");

        let fetches = changed.iter().map(|key| async move {
            let r = match timeout(self.config.fetch_timeout(), self.transport.fetch(key)).await {
                Ok(r) => r,
                Err(_) => Err(Error::Transport(format!("fetch timed out after {}ms", self.config.fetch_timeout_in_ms))),
            };
            (key, r)
        });

        let mut failed = HashSet::new();
        let mut applied = 0;
        for (key, r) in join_all(fetches).await {
            match r {
                Ok(remote) => {
                    if self.registry.apply_change(remote).is_some() {
                        applied += 1;
                    }
                }
                Err(e) => {
                    warn!(data_id = key.data_id(), group = key.group(), "failed to fetch config: {}", e);
                    failed.insert(key.clone());
                }
            }
        }

        for entry in &entries {
            entry.check_and_dispatch();
            if probed.contains(entry.key()) && !failed.contains(entry.key()) {
                entry.set_initializing(false);
            }
        }

        Ok(applied)
    }

    /// Spawns the supervisor: one loop per batch, new batches picked up as
    /// the registry grows. Every loop stops once `shutdown` fires.
    pub fn start(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tasks: Vec<JoinHandle<()>> = Vec::new();
            loop {
                let wanted = self.registry.task_count();
                while tasks.len() < wanted {
                    let task_id = tasks.len();
                    info!(agent = self.registry.agent(), task_id, "[long-polling] task started");
                    tasks.push(tokio::spawn(self.clone().run_task(task_id, shutdown.clone())));
                }

                tokio::select! {
                    biased;
                    _ = shutdown.changed() => {
                        warn!(agent = self.registry.agent(), "[long-polling] shutdown signal received");
                        break;
                    }
                    _ = sleep(self.config.long_poll_interval()) => {}
                }
            }
            join_all(tasks).await;
        })
    }

    async fn run_task(
        self: Arc<Self>,
        task_id: usize,
        mut shutdown: watch::Receiver<()>,
    ) {
        loop {
            let pause = match self.run_once(task_id).await {
                Ok(_) => self.config.long_poll_interval(),
                Err(e) => {
                    error!(agent = self.registry.agent(), task_id, "[long-polling] cycle failed: {}", e);
                    self.config.retry_backoff()
                }
            };

            tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                _ = sleep(pause) => {}
            }
        }
    }
}
