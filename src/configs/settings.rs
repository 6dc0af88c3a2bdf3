use config::{Config, Environment, File};
use error_stack::ResultExt;
use secrecy::Secret;
use serde::Deserialize;

use crate::{
    consts,
    core::errors::{ApplicationError, CustomResult},
};

pub const CONFIG_FILE_PATH: &str = "config/development.toml";
pub const ENV_PREFIX: &str = "STRIPE_TAX";

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: Server,
    pub stripe_tax: StripeTaxConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StripeTaxConfig {
    pub api_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

fn default_base_url() -> String {
    consts::STRIPE_API_BASE_URL.to_string()
}

fn default_cache_ttl() -> u64 {
    consts::DEFAULT_CACHE_TTL_SECONDS
}

impl Settings {
    /// Reads the configuration file, then applies `STRIPE_TAX__`-prefixed
    /// environment overrides.
    pub fn new() -> CustomResult<Self, ApplicationError> {
        Self::with_config_path(CONFIG_FILE_PATH)
    }

    pub fn with_config_path(config_path: &str) -> CustomResult<Self, ApplicationError> {
        Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .separator("__"),
            )
            .build()
            .change_context(ApplicationError::ConfigurationError)?
            .try_deserialize()
            .change_context(ApplicationError::ConfigurationError)
            .attach_printable("unable to deserialize application configuration")
    }
}
