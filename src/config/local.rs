use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LocalStoreConfig {
    /// Root of the failover and snapshot trees
    /// Default: "./data/config"
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Persist the last fetched content of every entry
    /// Default: true
    #[serde(default = "default_snapshot_enabled")]
    pub snapshot_enabled: bool,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            snapshot_enabled: default_snapshot_enabled(),
        }
    }
}

impl LocalStoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message("local.root_dir cannot be empty".into())));
        }
        if self.root_dir.is_file() {
            return Err(Error::Config(ConfigError::Message(format!(
                "local.root_dir {:?} is a file",
                self.root_dir
            ))));
        }
        Ok(())
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("./data/config")
}
fn default_snapshot_enabled() -> bool {
    true
}
