use crate::error::ConfigError;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub import: ImportSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Rejects values that would make the service unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError("server.port must be non-zero".to_string()));
        }
        if self.import.max_rows == 0 {
            return Err(ConfigError::ValidationError("import.max_rows must be at least 1".to_string()));
        }
        if self.broker.demo_url.is_empty() || self.broker.live_url.is_empty() {
            return Err(ConfigError::ValidationError("broker URLs must not be empty".to_string()));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: IpAddr,
    pub port: u16,
    /// Request body limit. Screenshots travel inline as data URIs.
    pub body_limit_mb: usize,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            body_limit_mb: 50,
        }
    }
}

/// Tradovate REST endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub demo_url: String,
    pub live_url: String,
    pub app_version: String,
    /// Per-request timeout. Unset means requests may wait indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            demo_url: "https://demo.tradovateapi.com/v1".to_string(),
            live_url: "https://live.tradovateapi.com/v1".to_string(),
            app_version: "1.0".to_string(),
            request_timeout_secs: None,
        }
    }
}

/// Limits on user-supplied trade data.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Maximum trades accepted by one CSV or bulk import.
    pub max_rows: usize,
    pub max_screenshot_bytes: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_rows: 500,
            max_screenshot_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// When set, logs also go to a daily rolling file in this directory.
    pub directory: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}
