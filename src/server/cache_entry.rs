use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use tracing::info;

use crate::constants::CONTENT_TYPE_TEXT;
use crate::constants::NULL_FINGERPRINT;
use crate::metrics::SERVER_CACHE_PUBLISH_TOTAL;
use crate::Error;
use crate::Result;

/// Fingerprint and the modification time it was published with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStamp {
    pub fingerprint: String,
    pub last_modified: i64,
}

impl VersionStamp {
    pub fn new(
        fingerprint: impl Into<String>,
        last_modified: i64,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            last_modified,
        }
    }
}

impl Default for VersionStamp {
    fn default() -> Self {
        Self::new(NULL_FINGERPRINT, 0)
    }
}

#[derive(Debug, Clone)]
struct BetaRelease {
    stamp: VersionStamp,
    target_ips: HashSet<String>,
    encrypted_data_key: Option<String>,
}

#[derive(Debug)]
struct EntryState {
    primary: VersionStamp,
    /// `Some` while a beta release is active
    beta: Option<BetaRelease>,
    tags: HashMap<String, VersionStamp>,
    content_type: String,
    encrypted_data_key: Option<String>,
}

/// Server-side state of one configuration document.
///
/// Every fingerprint/timestamp pair is read and replaced under the entry's own
/// lock, so readers never see a fingerprint from one publish combined with the
/// timestamp of another. Publishes carrying an older timestamp than the one
/// held are ignored and reported as `false`.
pub struct ServerCacheEntry {
    group_key: Arc<str>,
    state: RwLock<EntryState>,
}

impl std::fmt::Debug for ServerCacheEntry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ServerCacheEntry")
            .field("group_key", &self.group_key)
            .field("primary", &state.primary)
            .field("beta", &state.beta.as_ref().map(|b| &b.stamp))
            .field("tags", &state.tags.len())
            .finish()
    }
}

impl ServerCacheEntry {
    pub fn new(group_key: Arc<str>) -> Self {
        Self {
            group_key,
            state: RwLock::new(EntryState {
                primary: VersionStamp::default(),
                beta: None,
                tags: HashMap::new(),
                content_type: CONTENT_TYPE_TEXT.to_string(),
                encrypted_data_key: None,
            }),
        }
    }

    pub fn group_key(&self) -> &Arc<str> {
        &self.group_key
    }

    /// Primary fingerprint and timestamp as one consistent pair
    pub fn read_fingerprint(&self) -> VersionStamp {
        self.state.read().primary.clone()
    }

    /// Replaces the primary pair unless `last_modified` is older than the
    /// current one.
    pub fn publish(
        &self,
        fingerprint: impl Into<String>,
        last_modified: i64,
    ) -> bool {
        self.publish_primary(fingerprint.into(), last_modified, None)
    }

    /// Like [`ServerCacheEntry::publish`], storing `content_type` under the
    /// same write lock so readers never pair a new fingerprint with an old type.
    pub fn publish_with_type(
        &self,
        fingerprint: impl Into<String>,
        last_modified: i64,
        content_type: impl Into<String>,
    ) -> bool {
        self.publish_primary(fingerprint.into(), last_modified, Some(content_type.into()))
    }

    fn publish_primary(
        &self,
        fingerprint: String,
        last_modified: i64,
        content_type: Option<String>,
    ) -> bool {
        {
            let mut state = self.state.write();
            if last_modified < state.primary.last_modified {
                debug!(
                    group_key = %self.group_key,
                    current = state.primary.last_modified,
                    last_modified,
                    "stale publish ignored"
                );
                return false;
            }
            state.primary = VersionStamp::new(fingerprint.clone(), last_modified);
            if let Some(content_type) = content_type {
                state.content_type = content_type;
            }
        }

        SERVER_CACHE_PUBLISH_TOTAL.with_label_values(&["primary"]).inc();
        info!(group_key = %self.group_key, fingerprint = %fingerprint, last_modified, "[dump] ok");
        true
    }

    /// Primary pair together with its content type, read under one lock
    pub fn primary_release(&self) -> (VersionStamp, String) {
        let state = self.state.read();
        (state.primary.clone(), state.content_type.clone())
    }

    pub fn content_type(&self) -> String {
        self.state.read().content_type.clone()
    }

    pub fn set_content_type(
        &self,
        content_type: impl Into<String>,
    ) {
        self.state.write().content_type = content_type.into();
    }

    /// Opaque reference to the data key of an encrypted primary payload
    pub fn encrypted_data_key(&self) -> Option<String> {
        self.state.read().encrypted_data_key.clone()
    }

    pub fn set_encrypted_data_key(
        &self,
        key: Option<String>,
    ) {
        self.state.write().encrypted_data_key = key;
    }

    /// Starts, or replaces, the beta release served to `target_ips`. The
    /// primary pair is left alone.
    pub fn publish_beta(
        &self,
        fingerprint: impl Into<String>,
        last_modified: i64,
        target_ips: HashSet<String>,
    ) -> bool {
        let fingerprint = fingerprint.into();
        let ips = target_ips.len();
        {
            let mut state = self.state.write();
            if let Some(current) = &state.beta {
                if last_modified < current.stamp.last_modified {
                    debug!(group_key = %self.group_key, last_modified, "stale beta publish ignored");
                    return false;
                }
            }
            let encrypted_data_key = state.beta.take().and_then(|b| b.encrypted_data_key);
            state.beta = Some(BetaRelease {
                stamp: VersionStamp::new(fingerprint.clone(), last_modified),
                target_ips,
                encrypted_data_key,
            });
        }

        SERVER_CACHE_PUBLISH_TOTAL.with_label_values(&["beta"]).inc();
        info!(group_key = %self.group_key, fingerprint = %fingerprint, last_modified, ips, "[dump-beta] ok");
        true
    }

    /// Ends the beta release. Returns `false` when none was active.
    pub fn stop_beta(&self) -> bool {
        let stopped = self.state.write().beta.take().is_some();
        if stopped {
            info!(group_key = %self.group_key, "[dump-beta] beta stopped");
        }
        stopped
    }

    pub fn is_beta_enabled(&self) -> bool {
        self.state.read().beta.is_some()
    }

    pub fn beta_stamp(&self) -> Option<VersionStamp> {
        self.state.read().beta.as_ref().map(|b| b.stamp.clone())
    }

    pub fn beta_ips(&self) -> HashSet<String> {
        self.state
            .read()
            .beta
            .as_ref()
            .map(|b| b.target_ips.clone())
            .unwrap_or_default()
    }

    pub fn beta_encrypted_data_key(&self) -> Option<String> {
        self.state.read().beta.as_ref().and_then(|b| b.encrypted_data_key.clone())
    }

    /// Only applies to an active beta release; returns `false` otherwise
    pub fn set_beta_encrypted_data_key(
        &self,
        key: Option<String>,
    ) -> bool {
        match self.state.write().beta.as_mut() {
            Some(beta) => {
                beta.encrypted_data_key = key;
                true
            }
            None => false,
        }
    }

    /// Inserts or replaces the release labeled `tag`; other tags are untouched.
    /// Fails with `InvalidArgument` on a blank tag.
    pub fn publish_tag(
        &self,
        tag: &str,
        fingerprint: impl Into<String>,
        last_modified: i64,
    ) -> Result<bool> {
        if tag.trim().is_empty() {
            return Err(Error::invalid(format!("blank tag for {}", self.group_key)));
        }
        let fingerprint = fingerprint.into();
        {
            let mut state = self.state.write();
            if let Some(current) = state.tags.get(tag) {
                if last_modified < current.last_modified {
                    debug!(group_key = %self.group_key, tag, last_modified, "stale tag publish ignored");
                    return Ok(false);
                }
            }
            state
                .tags
                .insert(tag.to_string(), VersionStamp::new(fingerprint.clone(), last_modified));
        }

        SERVER_CACHE_PUBLISH_TOTAL.with_label_values(&["tag"]).inc();
        info!(group_key = %self.group_key, tag, fingerprint = %fingerprint, last_modified, "[dump-tag] ok");
        Ok(true)
    }

    pub fn remove_tag(
        &self,
        tag: &str,
    ) -> bool {
        let removed = self.state.write().tags.remove(tag).is_some();
        if removed {
            info!(group_key = %self.group_key, tag, "[dump-tag] tag removed");
        }
        removed
    }

    pub fn tag_stamp(
        &self,
        tag: &str,
    ) -> Option<VersionStamp> {
        self.state.read().tags.get(tag).cloned()
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.state.read().tags.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// The pair served to a client: its requested tag if released, else the
    /// beta release if it targets `client_ip`, else the primary pair.
    pub fn resolve_for(
        &self,
        client_ip: &str,
        tag: Option<&str>,
    ) -> VersionStamp {
        let state = self.state.read();

        if let Some(stamp) = tag.and_then(|t| state.tags.get(t)) {
            return stamp.clone();
        }
        if let Some(beta) = &state.beta {
            if beta.target_ips.contains(client_ip) {
                return beta.stamp.clone();
            }
        }
        state.primary.clone()
    }
}
