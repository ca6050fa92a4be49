use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings common to every service, read from `configuration.*` and
/// `APP__*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Read a required environment variable, rejecting empty values.
pub fn require_env(key: &str) -> Result<String, AppError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::ConfigError(anyhow::anyhow!("{} is required", key))),
    }
}

/// Read an optional environment variable and parse it, falling back to `default`
/// when absent. A present but unparsable value is a configuration error.
pub fn env_or<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
        }),
        _ => Ok(default),
    }
}
