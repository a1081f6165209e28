//! Layered configuration: built-in defaults, an optional TOML file, then
//! `COINBOT__*` environment variables (`COINBOT__EXCHANGE__API_KEY`, ...).

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::api::BitvavoConfig;
use crate::execution::TradingSettings;
use crate::gateway::GatewaySettings;

pub const DEFAULT_CONFIG_FILE: &str = "coinbot.toml";
const ENV_PREFIX: &str = "COINBOT";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "coinbot=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub exchange: BitvavoConfig,
    pub gateway: GatewaySettings,
    pub trading: TradingSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from `path` (or `coinbot.toml` when present) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}
