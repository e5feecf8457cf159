//! Fingerprinted configuration cache and listener notification core.
//!
//! - [`client`] - per-document client cache, listener dispatch, local
//!   failover/snapshot fallback and the long-poll reconcile loop
//! - [`server`] - per-document server fingerprints with beta and tag releases
//! - [`diff`] - per-content-type change sets handed to change-aware listeners
//! - [`filter`] - content filters applied before listeners see content

pub mod client;
mod config;
pub mod constants;
pub mod diff;
mod errors;
pub mod filter;
mod key;
pub mod metrics;
pub mod server;
pub mod utils;

pub use config::*;
pub use errors::*;
pub use key::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
