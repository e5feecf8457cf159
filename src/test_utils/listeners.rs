use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::ConfigChangeEvent;
use crate::client::Executor;
use crate::client::Listener;
use crate::Error;
use crate::Result;

/// Records every delivery it receives
#[derive(Default)]
pub struct RecordingListener {
    received: Mutex<Vec<Option<String>>>,
    changes: Mutex<Vec<ConfigChangeEvent>>,
    contexts: Mutex<Vec<(String, String)>>,
    change_aware: bool,
    executor: Option<Arc<dyn Executor>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn change_aware() -> Arc<Self> {
        Arc::new(Self {
            change_aware: true,
            ..Default::default()
        })
    }

    pub fn with_executor(
        executor: Arc<dyn Executor>,
        change_aware: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            change_aware,
            executor: Some(executor),
            ..Default::default()
        })
    }

    pub fn received(&self) -> Vec<Option<String>> {
        self.received.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().len()
    }

    pub fn last(&self) -> Option<Option<String>> {
        self.received.lock().last().cloned()
    }

    pub fn changes(&self) -> Vec<ConfigChangeEvent> {
        self.changes.lock().clone()
    }

    pub fn contexts(&self) -> Vec<(String, String)> {
        self.contexts.lock().clone()
    }
}

impl Listener for RecordingListener {
    fn receive_config_info(
        &self,
        config_info: Option<&str>,
    ) -> Result<()> {
        self.received.lock().push(config_info.map(str::to_string));
        Ok(())
    }

    fn is_change_aware(&self) -> bool {
        self.change_aware
    }

    fn receive_config_change(
        &self,
        event: &ConfigChangeEvent,
    ) -> Result<()> {
        self.changes.lock().push(event.clone());
        Ok(())
    }

    fn executor(&self) -> Option<Arc<dyn Executor>> {
        self.executor.clone()
    }

    fn fill_context(
        &self,
        data_id: &str,
        group: &str,
    ) {
        self.contexts.lock().push((data_id.to_string(), group.to_string()));
    }
}

/// Fails (or panics) on the first `failures` deliveries, then succeeds
pub struct FlakyListener {
    failures: usize,
    panic: bool,
    attempts: AtomicUsize,
    received: Mutex<Vec<Option<String>>>,
}

impl FlakyListener {
    pub fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            panic: false,
            attempts: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn panicking(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            panic: true,
            attempts: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Option<String>> {
        self.received.lock().clone()
    }
}

impl Listener for FlakyListener {
    fn receive_config_info(
        &self,
        config_info: Option<&str>,
    ) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            if self.panic {
                panic!("listener blew up on attempt {attempt}");
            }
            return Err(Error::Transport(format!("listener refused attempt {attempt}")));
        }
        self.received.lock().push(config_info.map(str::to_string));
        Ok(())
    }
}
