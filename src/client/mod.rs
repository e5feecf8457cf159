//! Client side of the configuration cache.
//!
//! - [`ClientCacheRegistry`] - one [`ClientCacheEntry`] per subscribed document
//! - [`NotificationDispatcher`] - delivers content changes to [`Listener`]s
//! - [`ReconcileWorker`] - long-poll loop feeding the registry from a [`ConfigTransport`]
//! - [`FileFallbackLoader`] - local failover and snapshot files
//!
//! # Basic Usage
//! ```no_run
//! use std::sync::Arc;
//!
//! use d_config::client::*;
//! use d_config::diff::DifferRegistry;
//! use d_config::filter::ConfigFilterChain;
//! use d_config::{CoreConfig, GroupKey};
//!
//! struct Printer;
//!
//! impl Listener for Printer {
//!     fn receive_config_info(&self, content: Option<&str>) -> d_config::Result<()> {
//!         println!("config changed: {:?}", content);
//!         Ok(())
//!     }
//! }
//!
//! let config = CoreConfig::new().unwrap();
//! let dispatcher = Arc::new(NotificationDispatcher::new(
//!     Arc::new(DifferRegistry::new()),
//!     Arc::new(ConfigFilterChain::new()),
//!     config.dispatch.clone(),
//! ));
//! let registry = ClientCacheRegistry::new(
//!     config.client.clone(),
//!     Arc::new(FileFallbackLoader::new(&config.local)),
//!     dispatcher,
//! );
//!
//! let key = GroupKey::new("app.properties", "DEFAULT_GROUP", "").unwrap();
//! registry.add_listener(&key, Arc::new(Printer));
//! ```

mod binding;
mod cache_entry;
mod dispatcher;
mod listener;
mod local_store;
mod registry;
mod worker;

pub use binding::*;
pub use cache_entry::*;
pub use dispatcher::*;
pub use listener::*;
pub use local_store::*;
pub use registry::*;
pub use worker::*;

#[cfg(test)]
mod dispatcher_test;
