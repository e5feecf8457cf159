//! Per-content-type diffing of configuration documents.
//!
//! A [`DifferRegistry`] resolves a differ by content type: externally registered
//! differs are consulted first, in registration order, then the built-in ones.
//! The first differ that claims the type produces the change set. Diffing is
//! advisory: unknown types and malformed content yield an empty change set.

mod properties;
mod registry;
mod structured;
pub use properties::*;
pub use registry::*;
pub use structured::*;


use std::collections::BTreeMap;
use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

/// One changed key between two versions of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub change_type: ChangeType,
}

impl ChangeRecord {
    pub fn added(
        key: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            old_value: None,
            new_value: Some(new_value.into()),
            change_type: ChangeType::Added,
        }
    }

    pub fn modified(
        key: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            old_value: Some(old_value.into()),
            new_value: Some(new_value.into()),
            change_type: ChangeType::Modified,
        }
    }

    pub fn deleted(
        key: impl Into<String>,
        old_value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            old_value: Some(old_value.into()),
            new_value: None,
            change_type: ChangeType::Deleted,
        }
    }
}

pub type ChangeSet = HashMap<String, ChangeRecord>;

/// Extension point for content-type specific diffing
#[cfg_attr(test, automock)]
pub trait ConfigDiffer: Send + Sync + 'static {
    /// Whether this differ handles `content_type`
    fn is_responsible_for(
        &self,
        content_type: &str,
    ) -> bool;

    /// Computes the per-key change set from `old_content` to `new_content`.
    /// `None` on either side is treated as an empty document.
    fn parse<'a, 'b>(
        &self,
        old_content: Option<&'a str>,
        new_content: Option<&'b str>,
        content_type: &str,
    ) -> Result<ChangeSet>;
}

/// Compares two flattened documents key by key
pub(crate) fn compute_changes(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for (key, old_value) in old {
        match new.get(key) {
            None => {
                changes.insert(key.clone(), ChangeRecord::deleted(key.clone(), old_value.clone()));
            }
            Some(new_value) if new_value != old_value => {
                changes.insert(
                    key.clone(),
                    ChangeRecord::modified(key.clone(), old_value.clone(), new_value.clone()),
                );
            }
            Some(_) => {}
        }
    }

    for (key, new_value) in new {
        if !old.contains_key(key) {
            changes.insert(key.clone(), ChangeRecord::added(key.clone(), new_value.clone()));
        }
    }

    changes
}
