use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{env_or, require_env};
use std::str::FromStr;
use std::time::Duration;

const SANDBOX_SNAP_URL: &str = "https://app.sandbox.midtrans.com/snap/v1";
const SANDBOX_API_URL: &str = "https://api.sandbox.midtrans.com/v2";
const PRODUCTION_SNAP_URL: &str = "https://app.midtrans.com/snap/v1";
const PRODUCTION_API_URL: &str = "https://api.midtrans.com/v2";

#[derive(Deserialize, Clone, Debug)]
pub struct BookingConfig {
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub jwt_secret: Secret<String>,
    pub gateway: GatewayConfig,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Option<Secret<String>>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnvironment {
    Sandbox,
    Production,
}

impl FromStr for GatewayEnvironment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(anyhow::anyhow!("unknown gateway environment '{}'", other)),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct GatewayConfig {
    pub server_key: Secret<String>,
    pub environment: GatewayEnvironment,
    pub snap_base_url: String,
    pub api_base_url: String,
    pub timeout_seconds: u64,
    /// Re-query the gateway for the authoritative status of a notification.
    pub verify_notifications: bool,
    /// Reject notifications whose `signature_key` does not verify.
    pub require_signature: bool,
}

impl GatewayConfig {
    pub fn new(server_key: impl Into<String>, environment: GatewayEnvironment) -> Self {
        let (snap, api) = match environment {
            GatewayEnvironment::Sandbox => (SANDBOX_SNAP_URL, SANDBOX_API_URL),
            GatewayEnvironment::Production => (PRODUCTION_SNAP_URL, PRODUCTION_API_URL),
        };
        Self {
            server_key: Secret::new(server_key.into()),
            environment,
            snap_base_url: snap.to_string(),
            api_base_url: api.to_string(),
            timeout_seconds: 15,
            verify_notifications: true,
            require_signature: true,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl BookingConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let storage: StorageBackend = env_or("STORAGE_BACKEND", StorageBackend::Postgres)?;
        let database_url = match storage {
            StorageBackend::Postgres => Some(Secret::new(require_env("DATABASE_URL")?)),
            StorageBackend::Memory => std::env::var("DATABASE_URL").ok().map(Secret::new),
        };

        let environment: GatewayEnvironment =
            env_or("MIDTRANS_ENVIRONMENT", GatewayEnvironment::Sandbox)?;
        let mut gateway = GatewayConfig::new(require_env("MIDTRANS_SERVER_KEY")?, environment);
        gateway.snap_base_url = env_or("MIDTRANS_SNAP_URL", gateway.snap_base_url)?;
        gateway.api_base_url = env_or("MIDTRANS_API_URL", gateway.api_base_url)?;
        gateway.timeout_seconds = env_or("GATEWAY_TIMEOUT_SECONDS", 15u64)?;
        gateway.verify_notifications = env_or("GATEWAY_VERIFY_NOTIFICATIONS", true)?;
        gateway.require_signature = env_or("GATEWAY_REQUIRE_SIGNATURE", true)?;

        Ok(Self {
            service_name: env_or("SERVICE_NAME", "booking-service".to_string())?,
            log_level: env_or("LOG_LEVEL", "info".to_string())?,
            otlp_endpoint: std::env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            storage,
            database: DatabaseConfig {
                url: database_url,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10u32)?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", 1u32)?,
            },
            jwt_secret: Secret::new(require_env("JWT_SECRET")?),
            gateway,
        })
    }
}
