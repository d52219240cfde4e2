//! Configuration module

use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Push service device key
    pub bark_key: String,
    pub router_password: String,
    #[serde(default = "default_router_addr")]
    pub router_addr: String,
    #[serde(default = "default_push_url")]
    pub push_url: String,
    #[serde(default = "default_push_group")]
    pub push_group: String,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Consecutive absent ticks before a device is reported offline
    #[serde(default = "default_offline_ticks")]
    pub offline_ticks: u32,
    #[serde(default = "default_max_auth_failures")]
    pub max_auth_failures: u32,
    #[serde(default = "default_router_timeout_ms")]
    pub router_timeout_ms: u64,
    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,
}

fn default_router_addr() -> String {
    "192.168.0.1".to_string()
}

fn default_push_url() -> String {
    "https://api.day.app".to_string()
}

fn default_push_group() -> String {
    "WiFi".to_string()
}

fn default_tick_interval_ms() -> u64 {
    2000
}

fn default_offline_ticks() -> u32 {
    100
}

fn default_max_auth_failures() -> u32 {
    3
}

fn default_router_timeout_ms() -> u64 {
    1000
}

fn default_push_timeout_ms() -> u64 {
    10_000
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::default());

        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let settings = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.bark_key.trim().is_empty() {
            return Err(AppError::Config("BARK_KEY must not be empty".to_string()));
        }
        if self.router_password.is_empty() {
            return Err(AppError::Config(
                "ROUTER_PASSWORD must not be empty".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(AppError::Config(
                "TICK_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }
        if self.router_timeout_ms == 0 {
            return Err(AppError::Config(
                "ROUTER_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }
        if self.push_timeout_ms == 0 {
            return Err(AppError::Config(
                "PUSH_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }
        if self.offline_ticks == 0 {
            return Err(AppError::Config(
                "OFFLINE_TICKS must be greater than 0".to_string(),
            ));
        }
        if self.max_auth_failures == 0 {
            return Err(AppError::Config(
                "MAX_AUTH_FAILURES must be greater than 0".to_string(),
            ));
        }
        url::Url::parse(&self.push_url)
            .map_err(|e| AppError::Config(format!("Invalid PUSH_URL {}: {}", self.push_url, e)))?;

        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn router_timeout(&self) -> Duration {
        Duration::from_millis(self.router_timeout_ms)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }
}
