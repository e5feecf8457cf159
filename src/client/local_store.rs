//! Local failover and snapshot files.
//!
//! Failover files are placed by operators to override remote content; the
//! client never writes them. Snapshots hold the last content fetched from the
//! server and seed entries when the server is unreachable.

use std::path::Path;
use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;
use tracing::debug;
use tracing::warn;

use crate::constants::FAILOVER_DIR;
use crate::constants::SNAPSHOT_DIR;
use crate::file_io;
use crate::Error;
use crate::GroupKey;
use crate::LocalStoreConfig;
use crate::Result;

#[cfg_attr(test, automock)]
pub trait LocalFallbackLoader: Send + Sync + 'static {
    /// Operator-supplied override, if present
    fn load_failover(
        &self,
        name: &str,
        key: &GroupKey,
    ) -> Option<String>;

    /// Modification time (ms) of the failover file, if present
    fn failover_last_modified(
        &self,
        name: &str,
        key: &GroupKey,
    ) -> Option<i64>;

    /// Last content fetched from the server, if saved
    fn load_snapshot(
        &self,
        name: &str,
        key: &GroupKey,
    ) -> Option<String>;

    /// Saves `content` as the snapshot; `None` removes it
    fn save_snapshot<'a>(
        &self,
        name: &str,
        key: &GroupKey,
        content: Option<&'a str>,
    ) -> Result<()>;

    /// Removes every snapshot of agent `name`
    fn clean_snapshots(
        &self,
        name: &str,
    ) -> Result<()>;
}

/// Filesystem layout:
/// `{root}/{agent}/failover/{namespace}/{group}/{dataId}` and
/// `{root}/{agent}/snapshot/{namespace}/{group}/{dataId}`
#[derive(Debug, Clone)]
pub struct FileFallbackLoader {
    root: PathBuf,
    snapshot_enabled: bool,
}

impl FileFallbackLoader {
    pub fn new(config: &LocalStoreConfig) -> Self {
        Self {
            root: config.root_dir.clone(),
            snapshot_enabled: config.snapshot_enabled,
        }
    }

    pub fn failover_path(
        &self,
        name: &str,
        key: &GroupKey,
    ) -> Result<PathBuf> {
        self.path_of(FAILOVER_DIR, name, key)
    }

    pub fn snapshot_path(
        &self,
        name: &str,
        key: &GroupKey,
    ) -> Result<PathBuf> {
        self.path_of(SNAPSHOT_DIR, name, key)
    }

    fn path_of(
        &self,
        kind: &str,
        name: &str,
        key: &GroupKey,
    ) -> Result<PathBuf> {
        let mut path = self.root.join(safe_component(name)?).join(kind);
        for component in [key.namespace(), key.group(), key.data_id()] {
            path.push(safe_component(component)?);
        }
        Ok(path)
    }

    fn read(
        &self,
        path: Result<PathBuf>,
    ) -> Option<String> {
        let path = match path {
            Ok(p) => p,
            Err(e) => {
                warn!("local config path rejected: {}", e);
                return None;
            }
        };
        match file_io::read_if_exists(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(?path, "failed to read local config: {}", e);
                None
            }
        }
    }
}

impl LocalFallbackLoader for FileFallbackLoader {
    fn load_failover(
        &self,
        name: &str,
        key: &GroupKey,
    ) -> Option<String> {
        let content = self.read(self.failover_path(name, key));
        if content.is_some() {
            warn!(agent = name, data_id = key.data_id(), group = key.group(), "[get-config] using failover content");
        }
        content
    }

    fn failover_last_modified(
        &self,
        name: &str,
        key: &GroupKey,
    ) -> Option<i64> {
        let path = self.failover_path(name, key).ok()?;
        match file_io::modified_millis(&path) {
            Ok(ts) => ts,
            Err(e) => {
                warn!(?path, "failed to stat failover file: {}", e);
                None
            }
        }
    }

    fn load_snapshot(
        &self,
        name: &str,
        key: &GroupKey,
    ) -> Option<String> {
        if !self.snapshot_enabled {
            return None;
        }
        self.read(self.snapshot_path(name, key))
    }

    fn save_snapshot(
        &self,
        name: &str,
        key: &GroupKey,
        content: Option<&str>,
    ) -> Result<()> {
        if !self.snapshot_enabled {
            return Ok(());
        }
        let path = self.snapshot_path(name, key)?;
        match content {
            Some(c) => file_io::write_atomically(&path, c)?,
            None => file_io::remove_if_exists(&path)?,
        }
        debug!(agent = name, data_id = key.data_id(), group = key.group(), "snapshot saved");
        Ok(())
    }

    fn clean_snapshots(
        &self,
        name: &str,
    ) -> Result<()> {
        let dir = self.root.join(safe_component(name)?).join(SNAPSHOT_DIR);
        remove_dir_if_exists(&dir)
    }
}

fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(crate::StorageError::PathError {
            path: dir.to_path_buf(),
            source: e,
        }
        .into()),
    }
}

/// A single path segment: no separators, no `.`/`..`
fn safe_component(s: &str) -> Result<&str> {
    if s.is_empty() || s == "." || s == ".." || s.contains(['/', '\\', '\0']) {
        return Err(Error::invalid(format!("{s:?} is not a valid local path component")));
    }
    Ok(s)
}
