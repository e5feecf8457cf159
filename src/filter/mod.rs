//! Content filter chain applied to configuration content before listeners see it.
//!
//! Filters may transform or decrypt content. The chain is shared by every
//! dispatch and invoked concurrently, so filters synchronize any internal state
//! (key caches and the like) themselves.

mod chain;
pub use chain::*;


use crate::Result;

/// Request side of a filtered configuration exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRequest {
    pub tenant: String,
    pub data_id: String,
    pub group: String,
    pub content: Option<String>,
    pub content_type: String,
}

/// Response side of a filtered configuration exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigResponse {
    pub tenant: String,
    pub data_id: String,
    pub group: String,
    pub content: Option<String>,
    pub content_type: String,
    /// Opaque reference to the data key of an encrypted payload
    pub encrypted_data_key: Option<String>,
}

pub trait ConfigFilter: Send + Sync + 'static {
    /// Unique name, used to ignore duplicate registrations
    fn name(&self) -> &str;

    /// Lower values run first
    fn order(&self) -> i32;

    fn do_filter(
        &self,
        request: Option<&ConfigRequest>,
        response: &mut ConfigResponse,
    ) -> Result<()>;
}
