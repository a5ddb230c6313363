use crate::error::{ConfigError, Result};
use probe_core::Target;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_SCRAPE_INTERVAL_SECONDS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 1;

/// Resolved startup configuration. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Listen address for the exposition endpoint: `":8080"`, `"8080"` or `"host:port"`.
    #[serde(alias = "Port")]
    pub port: String,
    #[serde(
        default = "default_scrape_interval",
        alias = "scrapeIntervalSeconds",
        alias = "ScrapeIntervalSeconds"
    )]
    pub scrape_interval_seconds: u64,
    #[serde(
        default = "default_request_timeout",
        alias = "requestTimeoutSeconds",
        alias = "RequestTimeoutSeconds"
    )]
    pub request_timeout_seconds: u64,
    #[serde(default, alias = "URLmap", alias = "Urls")]
    pub urls: Vec<String>,
}

fn default_scrape_interval() -> u64 {
    DEFAULT_SCRAPE_INTERVAL_SECONDS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

impl ScrapeConfig {
    pub fn builder() -> ScrapeConfigBuilder {
        ScrapeConfigBuilder::default()
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Socket address the exposition endpoint binds to. A bare port or
    /// `:port` binds on all interfaces.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let port = self.port.trim();
        let candidate = if let Some(rest) = port.strip_prefix(':') {
            format!("0.0.0.0:{}", rest)
        } else if port.parse::<u16>().is_ok() {
            format!("0.0.0.0:{}", port)
        } else {
            port.to_string()
        };

        candidate.parse().map_err(|e| {
            ConfigError::Invalid(format!("port '{}' is not a listen address: {}", self.port, e))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(ConfigError::Invalid("port cannot be empty".to_string()));
        }
        self.listen_addr()?;

        if self.scrape_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "scrape_interval_seconds must be > 0".to_string(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_seconds must be > 0".to_string(),
            ));
        }

        if self.urls.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one URL must be configured".to_string(),
            ));
        }

        for (i, url) in self.urls.iter().enumerate() {
            Target::parse(url)
                .map_err(|e| ConfigError::Invalid(format!("url {}: {}", i, e)))?;
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct ScrapeConfigBuilder {
    port: Option<String>,
    scrape_interval_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
    urls: Vec<String>,
}

impl ScrapeConfigBuilder {
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn scrape_interval_seconds(mut self, seconds: u64) -> Self {
        self.scrape_interval_seconds = Some(seconds);
        self
    }

    pub fn request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.request_timeout_seconds = Some(seconds);
        self
    }

    pub fn add_url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    pub fn build(self) -> ScrapeConfig {
        ScrapeConfig {
            port: self.port.unwrap_or_else(|| ":8080".to_string()),
            scrape_interval_seconds: self
                .scrape_interval_seconds
                .unwrap_or(DEFAULT_SCRAPE_INTERVAL_SECONDS),
            request_timeout_seconds: self
                .request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            urls: self.urls,
        }
    }
}
