//! Configuration management for the configuration cache core.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Environment variable overrides
//! - Configuration file support
//! - Component-wise validation
mod client;
mod dispatch;
mod local;
mod monitoring;
pub use client::*;
pub use dispatch::*;
pub use local::*;
pub use monitoring::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment prefix of every override, e.g. `DCONFIG__CLIENT__PER_TASK_SIZE`
pub(crate) const ENV_PREFIX: &str = "DCONFIG";

/// Main configuration container
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct CoreConfig {
    /// Client cache and long-poll batching
    #[serde(default)]
    pub client: ClientConfig,
    /// Local failover and snapshot store
    #[serde(default)]
    pub local: LocalStoreConfig,
    /// Listener notification
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Metrics endpoint
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Debug for CoreConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("client", &self.client)
            .field("local", &self.local)
            .finish()
    }
}

impl CoreConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `DCONFIG__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so further overrides can be applied via
    /// `with_override_config()`. Callers MUST call `validate()` before use.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance
    pub fn validate(self) -> Result<Self> {
        self.client.validate()?;
        self.local.validate()?;
        self.dispatch.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}
