//! Shared by the unit tests of every module
mod common;
mod listeners;

pub use common::*;
pub use listeners::*;
