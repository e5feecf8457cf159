use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Deliveries slower than this are logged at warn level.
    /// Listeners that regularly cross it should declare their own executor.
    #[serde(default = "default_slow_listener_threshold")]
    pub slow_listener_threshold_in_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            slow_listener_threshold_in_ms: default_slow_listener_threshold(),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }

    pub fn slow_listener_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_listener_threshold_in_ms)
    }
}

fn default_slow_listener_threshold() -> u64 {
    1000
}
