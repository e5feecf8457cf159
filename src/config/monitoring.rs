use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

/// `/metrics` endpoint of the process
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    /// Default: false
    #[serde(default)]
    pub prometheus_enabled: bool,

    /// Default: 8080
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: false,
            prometheus_port: default_prometheus_port(),
        }
    }
}

impl MonitoringConfig {
    /// Only an enabled endpoint is checked: its port must be unprivileged.
    pub fn validate(&self) -> Result<()> {
        if !self.prometheus_enabled {
            if self.prometheus_port != default_prometheus_port() {
                warn!(
                    "monitoring.prometheus_port set to {} while the endpoint is disabled",
                    self.prometheus_port
                );
            }
            return Ok(());
        }

        if self.prometheus_port < 1024 {
            return Err(Error::Config(ConfigError::Message(format!(
                "monitoring.prometheus_port {} must be >= 1024",
                self.prometheus_port
            ))));
        }
        Ok(())
    }
}

fn default_prometheus_port() -> u16 {
    8080
}
