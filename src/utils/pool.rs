//! Interned group keys.
//!
//! Server-side entries and registry slots for the same group key share a single
//! allocation. A key leaves the pool together with the cache entry that owns it.

use std::sync::Arc;

use dashmap::DashSet;

#[derive(Debug, Default)]
pub struct StringPool {
    strings: DashSet<Arc<str>>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pooled copy of `value`, inserting it on first use
    pub fn intern(
        &self,
        value: &str,
    ) -> Arc<str> {
        if let Some(existing) = self.strings.get(value) {
            return existing.key().clone();
        }
        let candidate: Arc<str> = Arc::from(value);
        if self.strings.insert(candidate.clone()) {
            return candidate;
        }
        // Lost the race against a concurrent insert
        self.strings.get(value).map(|e| e.key().clone()).unwrap_or(candidate)
    }

    pub fn remove(
        &self,
        value: &str,
    ) {
        self.strings.remove(value);
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
