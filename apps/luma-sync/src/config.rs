use crate::session::{DEFAULT_REQUEST_TIMEOUT, SessionConfig};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://luma.lacuna.cc/";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

pub const API_BASE_URL_VAR: &str = "LUMA_API_BASE_URL";
pub const API_TIMEOUT_VAR: &str = "LUMA_API_TIMEOUT_SECS";
pub const BIND_ADDR_VAR: &str = "LUMA_BIND_ADDR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.to_string(),
        }
    }
}

/// Luma client configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub session: SessionConfig,
    /// Listen address for the HTTP trigger.
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let base_url = value(API_BASE_URL_VAR).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let timeout = match value(API_TIMEOUT_VAR) {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };
        let bind_addr = value(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            session: session_config(&base_url, timeout)?,
            bind_addr: parse_bind_addr(&bind_addr)?,
        })
    }

    pub fn set_base_url(&mut self, base_url: &str) -> Result<(), ConfigError> {
        self.session = session_config(base_url, self.session.timeout())?;
        Ok(())
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), ConfigError> {
        self.session = self.session.clone().with_timeout(checked_timeout(timeout)?);
        Ok(())
    }

    pub fn set_bind_addr(&mut self, bind_addr: &str) -> Result<(), ConfigError> {
        self.bind_addr = parse_bind_addr(bind_addr)?;
        Ok(())
    }
}

fn session_config(base_url: &str, timeout: Duration) -> Result<SessionConfig, ConfigError> {
    SessionConfig::new(base_url)
        .map(|config| config.with_timeout(timeout))
        .map_err(|err| ConfigError::invalid(API_BASE_URL_VAR, err))
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    let secs = raw
        .parse::<u64>()
        .map_err(|err| ConfigError::invalid(API_TIMEOUT_VAR, err))?;
    checked_timeout(Duration::from_secs(secs))
}

fn checked_timeout(timeout: Duration) -> Result<Duration, ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::invalid(API_TIMEOUT_VAR, "must be positive"));
    }
    Ok(timeout)
}

fn parse_bind_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    // Same IPv4 preference for localhost as the listener expects.
    let normalized = if raw.starts_with("localhost:") {
        raw.replacen("localhost", "127.0.0.1", 1)
    } else {
        raw.to_string()
    };
    normalized
        .parse()
        .map_err(|err| ConfigError::invalid(BIND_ADDR_VAR, err))
}
