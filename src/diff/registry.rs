use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;
use tracing::warn;

use super::ChangeSet;
use super::ConfigDiffer;
use super::PropertiesDiffer;
use super::StructuredDiffer;
use crate::metrics::CONFIG_DIFF_FAILURES;

/// Ordered set of differs resolved by content type.
///
/// Constructed explicitly and shared by `Arc`; there is no process-wide
/// instance. Registration is rare and swaps the externally registered list
/// wholesale, so lookups never take a lock.
pub struct DifferRegistry {
    registered: ArcSwap<Vec<Arc<dyn ConfigDiffer>>>,
    builtins: Vec<Arc<dyn ConfigDiffer>>,
}

impl std::fmt::Debug for DifferRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DifferRegistry")
            .field("registered", &self.registered.load().len())
            .field("builtins", &self.builtins.len())
            .finish()
    }
}

impl Default for DifferRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DifferRegistry {
    /// Registry with the built-in properties, YAML, JSON and TOML differs
    pub fn new() -> Self {
        Self::with_builtins(vec![
            Arc::new(PropertiesDiffer),
            Arc::new(StructuredDiffer::yaml()),
            Arc::new(StructuredDiffer::json()),
            Arc::new(StructuredDiffer::toml()),
        ])
    }

    pub fn with_builtins(builtins: Vec<Arc<dyn ConfigDiffer>>) -> Self {
        Self {
            registered: ArcSwap::from_pointee(Vec::new()),
            builtins,
        }
    }

    /// Adds a differ consulted after previously registered ones and before
    /// every built-in.
    pub fn register_differ(
        &self,
        differ: Arc<dyn ConfigDiffer>,
    ) {
        self.registered.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(differ.clone());
            next
        });
    }

    pub fn len(&self) -> usize {
        self.registered.load().len() + self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Change set from `old_content` to `new_content` computed by the first
    /// responsible differ. Never fails: no responsible differ, a parse error or
    /// a panicking differ all yield an empty change set.
    pub fn diff(
        &self,
        old_content: Option<&str>,
        new_content: Option<&str>,
        content_type: &str,
    ) -> ChangeSet {
        let registered = self.registered.load();
        let differ = registered
            .iter()
            .chain(self.builtins.iter())
            .find(|d| d.is_responsible_for(content_type));

        let differ = match differ {
            Some(d) => d,
            None => {
                debug!(content_type, "no differ responsible, empty change set");
                return ChangeSet::new();
            }
        };

        match catch_unwind(AssertUnwindSafe(|| differ.parse(old_content, new_content, content_type))) {
            Ok(Ok(changes)) => changes,
            Ok(Err(e)) => {
                warn!(content_type, "config diff failed: {}", e);
                CONFIG_DIFF_FAILURES.with_label_values(&[content_type]).inc();
                ChangeSet::new()
            }
            Err(_) => {
                warn!(content_type, "config differ panicked");
                CONFIG_DIFF_FAILURES.with_label_values(&[content_type]).inc();
                ChangeSet::new()
            }
        }
    }
}
