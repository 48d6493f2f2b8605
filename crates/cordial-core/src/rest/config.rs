//! Dispatcher configuration
//!
//! Set once at construction and shared read-only by every request issued
//! through the instance.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default API base path prepended to every endpoint
pub const DEFAULT_BASE_PATH: &str = "/api/v9";

const DEFAULT_USER_AGENT: &str = concat!("cordial-core/", env!("CARGO_PKG_VERSION"));

/// Configuration for a [`Dispatcher`](super::Dispatcher)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Bot token; presence toggles the `Authorization` header
    pub token: Option<String>,
    /// Remote host, scheme included (e.g. `https://discord.com`)
    pub host: String,
    /// Base path joined between host and endpoint
    pub base_path: String,
    /// User agent sent with every request
    pub user_agent: String,
}

impl RestConfig {
    /// Create a configuration for the given host with defaults applied
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            token: None,
            host: host.into(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Set the bot token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the API base path
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Override the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate that the configured host parses as a URL
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.host).map_err(|e| Error::Configuration {
            message: format!("invalid host: {}", self.host),
            source: Some(anyhow::anyhow!(e)),
        })?;
        Ok(())
    }

    /// Full URL for an endpoint path
    pub(crate) fn request_url(&self, endpoint: &str) -> Result<Url> {
        let raw = format!(
            "{}{}{}",
            self.host.trim_end_matches('/'),
            self.base_path,
            endpoint
        );
        Url::parse(&raw).map_err(|e| Error::Configuration {
            message: format!("invalid request URL: {raw}"),
            source: Some(anyhow::anyhow!(e)),
        })
    }

    /// Route identifier reported in rate-limit events
    pub(crate) fn route(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_path, endpoint)
    }
}
