//! Server side of the configuration cache: the fingerprint every client is
//! compared against, per document and per rollout population.

mod cache_entry;
mod registry;

pub use cache_entry::*;
pub use registry::*;
