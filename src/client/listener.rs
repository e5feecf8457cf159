use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::debug;
use tracing::warn;

use crate::diff::ChangeRecord;
use crate::diff::ChangeSet;
use crate::DeliveryError;
use crate::Error;
use crate::Result;

/// One unit of listener delivery
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Change data handed to change-aware listeners
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigChangeEvent {
    data: ChangeSet,
}

impl ConfigChangeEvent {
    pub fn new(data: ChangeSet) -> Self {
        Self { data }
    }

    pub fn change_item(
        &self,
        key: &str,
    ) -> Option<&ChangeRecord> {
        self.data.get(key)
    }

    pub fn change_items(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.data.values()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Callback registered on a configuration document.
///
/// Only `receive_config_info` is mandatory. A listener without an
/// [`Executor`] runs inline on the reconciliation path, so a slow or hung
/// callback delays every later delivery of that cycle. Long-running listeners
/// should return a dedicated executor from [`Listener::executor`].
pub trait Listener: Send + Sync + 'static {
    /// Receives the (filtered) content. `None` when the document was removed.
    fn receive_config_info(
        &self,
        config_info: Option<&str>,
    ) -> Result<()>;

    /// Change-aware listeners additionally receive per-key change data
    fn is_change_aware(&self) -> bool {
        false
    }

    /// Called after `receive_config_info` for change-aware listeners
    fn receive_config_change(
        &self,
        _event: &ConfigChangeEvent,
    ) -> Result<()> {
        Ok(())
    }

    /// Execution context for deliveries; `None` delivers inline
    fn executor(&self) -> Option<Arc<dyn Executor>> {
        None
    }

    /// Shared listeners learn which document is being delivered
    fn fill_context(
        &self,
        _data_id: &str,
        _group: &str,
    ) {
    }
}

/// Execution context a listener may declare for its deliveries.
///
/// The dispatcher does not wait for submitted jobs. Whether two jobs of the
/// same listener run in submission order is up to the executor.
pub trait Executor: Send + Sync + 'static {
    fn execute(
        &self,
        job: Job,
    ) -> Result<()>;
}

/// Runs deliveries on the blocking pool of a tokio runtime. No ordering
/// guarantee between jobs.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Executor bound to the runtime of the caller
    pub fn current() -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Fatal(format!("no tokio runtime: {e}")))?;
        Ok(Self::new(handle))
    }
}

impl Executor for TokioExecutor {
    fn execute(
        &self,
        job: Job,
    ) -> Result<()> {
        self.handle.spawn_blocking(job);
        Ok(())
    }
}

/// Runs deliveries one at a time, in submission order, on a dedicated thread
pub struct SerialExecutor {
    name: String,
    sender: Mutex<Option<std::sync::mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SerialExecutor").field("name", &self.name).finish()
    }
}

impl SerialExecutor {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = std::sync::mpsc::channel::<Job>();
        let worker = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            })
            .map_err(|e| Error::Fatal(format!("failed to spawn executor thread {name}: {e}")))?;

        debug!(executor = %name, "serial executor started");
        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stops accepting jobs and waits until the queued ones have run.
    /// Must not be called from a job of this executor.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!(executor = %self.name, "executor thread panicked");
            }
        }
    }
}

impl Executor for SerialExecutor {
    fn execute(
        &self,
        job: Job,
    ) -> Result<()> {
        let guard = self.sender.lock();
        let sender = guard
            .as_ref()
            .ok_or_else(|| DeliveryError::Executor(format!("{} is shut down", self.name)))?;
        sender
            .send(job)
            .map_err(|_| DeliveryError::Executor(format!("{} worker is gone", self.name)))?;
        Ok(())
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit on its own
        self.sender.lock().take();
    }
}
