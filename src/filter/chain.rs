use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use super::ConfigFilter;
use super::ConfigRequest;
use super::ConfigResponse;
use crate::DeliveryError;
use crate::Result;

/// Filters sorted by [`ConfigFilter::order`]. Additions swap the list
/// wholesale; concurrent `do_filter` calls keep using the list they loaded.
pub struct ConfigFilterChain {
    filters: ArcSwap<Vec<Arc<dyn ConfigFilter>>>,
}

impl std::fmt::Debug for ConfigFilterChain {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let names: Vec<String> = self.filters.load().iter().map(|f| f.name().to_string()).collect();
        f.debug_struct("ConfigFilterChain").field("filters", &names).finish()
    }
}

impl Default for ConfigFilterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigFilterChain {
    pub fn new() -> Self {
        Self {
            filters: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Inserts `filter` by order. Returns `false` when a filter with the same
    /// name is already present.
    pub fn add_filter(
        &self,
        filter: Arc<dyn ConfigFilter>,
    ) -> bool {
        let mut added = false;
        self.filters.rcu(|current| {
            if current.iter().any(|f| f.name() == filter.name()) {
                added = false;
                return current.clone();
            }
            let mut next: Vec<Arc<dyn ConfigFilter>> = current.iter().cloned().collect();
            let pos = next.partition_point(|f| f.order() <= filter.order());
            next.insert(pos, filter.clone());
            added = true;
            Arc::new(next)
        });
        if added {
            debug!(filter = filter.name(), order = filter.order(), "config filter added");
        }
        added
    }

    pub fn len(&self) -> usize {
        self.filters.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every filter in order. The first failure aborts the chain.
    pub fn do_filter(
        &self,
        request: Option<&ConfigRequest>,
        response: &mut ConfigResponse,
    ) -> Result<()> {
        let filters = self.filters.load();
        for filter in filters.iter() {
            filter.do_filter(request, response).map_err(|e| DeliveryError::Filter {
                filter: filter.name().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}
