//! Client configuration.
//!
//! A `ClientConfig` is built once and never mutated; every request reads the
//! base URL and token from it.

use std::env;
use std::time::Duration;

use url::Url;

/// Production endpoint of the Witness API.
pub const DEFAULT_BASE_URL: &str = "https://api.witness.co";

pub const BASE_URL_ENV: &str = "WITNESS_API_URL";
pub const TOKEN_ENV: &str = "WITNESS_API_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base URL '{0}' cannot carry a path")]
    CannotBeABase(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl ClientConfig {
    /// Configuration for the production endpoint without a token.
    pub fn new() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            token: None,
            timeout: None,
        }
    }

    /// Reads `WITNESS_API_URL` and `WITNESS_API_TOKEN`, falling back to the
    /// production endpoint and no token.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        if let Ok(url) = env::var(BASE_URL_ENV) {
            config = config.with_base_url(&url)?;
        }
        if let Ok(token) = env::var(TOKEN_ENV) {
            config = config.with_token(token);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim_end_matches('/');
        let url = Url::parse(trimmed).map_err(|source| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::CannotBeABase(base_url.to_string()));
        }
        self.base_url = url;
        Ok(self)
    }

    /// Sets the bearer token. An empty token leaves the client unauthenticated.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.is_empty() { None } else { Some(token) };
        self
    }

    /// Global per-request timeout handed to the transport. `None` keeps the
    /// transport default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
