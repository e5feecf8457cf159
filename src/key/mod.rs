mod group_key;
pub use group_key::*;
