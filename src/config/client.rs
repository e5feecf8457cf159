use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    /// Name of the client agent; disambiguates several agents in one process
    /// and namespaces their local files.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Maximum number of cache entries probed by one long-poll batch
    #[serde(default = "default_per_task_size")]
    pub per_task_size: usize,

    /// Pause between two reconciliation cycles of the same batch
    #[serde(default = "default_long_poll_interval")]
    pub long_poll_interval_in_ms: u64,

    /// Pause after a failed reconciliation cycle
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_in_ms: u64,

    /// Upper bound of one transport call
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_in_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            per_task_size: default_per_task_size(),
            long_poll_interval_in_ms: default_long_poll_interval(),
            retry_backoff_in_ms: default_retry_backoff(),
            fetch_timeout_in_ms: default_fetch_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.agent_name.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message("agent_name cannot be empty".into())));
        }
        if self.agent_name.contains(['/', '\\']) {
            return Err(Error::Config(ConfigError::Message(format!(
                "agent_name {:?} cannot contain path separators",
                self.agent_name
            ))));
        }
        if self.per_task_size == 0 {
            return Err(Error::Config(ConfigError::Message("per_task_size must be > 0".into())));
        }
        if self.long_poll_interval_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "long_poll_interval_in_ms cannot be 0".into(),
            )));
        }
        if self.fetch_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message("fetch_timeout_in_ms cannot be 0".into())));
        }
        Ok(())
    }

    pub fn long_poll_interval(&self) -> Duration {
        Duration::from_millis(self.long_poll_interval_in_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_in_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_in_ms)
    }
}

fn default_agent_name() -> String {
    "default".into()
}
fn default_per_task_size() -> usize {
    3000
}
// in ms
fn default_long_poll_interval() -> u64 {
    1000
}
fn default_retry_backoff() -> u64 {
    2000
}
fn default_fetch_timeout() -> u64 {
    3000
}
