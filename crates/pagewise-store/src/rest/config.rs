//! PostgREST client configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Default timeout for HTTP requests: 30 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for [`RestStore`](super::RestStore).
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct RestConfig {
    /// Base URL of the REST endpoint, e.g. `https://project.example.co/rest/v1`
    #[cfg_attr(feature = "config", arg(long = "rest-url", env = "REST_URL"))]
    pub base_url: String,

    /// API key sent as `apikey` and bearer token
    #[cfg_attr(feature = "config", arg(long = "rest-api-key", env = "REST_API_KEY"))]
    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "rest-timeout", env = "REST_TIMEOUT", default_value = "30")
    )]
    #[serde(default = "default_timeout_secs")]
    pub http_timeout: u64,

    /// User-Agent header to send with requests
    #[cfg_attr(feature = "config", arg(long = "rest-user-agent", env = "REST_USER_AGENT"))]
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl std::fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "****"))
            .field("http_timeout", &self.http_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl RestConfig {
    /// Creates a configuration for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            http_timeout: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.http_timeout = timeout_secs;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Returns the effective timeout, using default if zero.
    pub fn effective_timeout(&self) -> Duration {
        match self.http_timeout {
            0 => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    /// Returns the effective user agent, using default if not set.
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("pagewise/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Parses the base URL, ensuring table names join beneath it.
    pub fn base(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|error| {
            Error::configuration()
                .with_message(format!("Invalid REST base URL '{}'", self.base_url))
                .with_source(error)
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration()
                .with_message(format!("Unsupported URL scheme '{}'", url.scheme())));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::configuration().with_message("REST base URL is empty"));
        }
        self.base()?;

        if self.api_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            return Err(Error::configuration().with_message("REST API key is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_gets_trailing_slash() {
        let config = RestConfig::new("https://db.example.com/rest/v1");
        let base = config.base().unwrap();
        assert_eq!(base.as_str(), "https://db.example.com/rest/v1/");
        assert_eq!(
            base.join("orders").unwrap().as_str(),
            "https://db.example.com/rest/v1/orders"
        );
    }

    #[test]
    fn validate_rejects_bad_urls() {
        assert!(RestConfig::new("").validate().is_err());
        assert!(RestConfig::new("not a url").validate().is_err());
        assert!(RestConfig::new("ftp://db.example.com").validate().is_err());
        assert!(
            RestConfig::new("https://db.example.com")
                .with_api_key(" ")
                .validate()
                .is_err()
        );
        assert!(RestConfig::new("http://localhost:3000").validate().is_ok());
    }

    #[test]
    fn effective_defaults() {
        let config = RestConfig::new("http://localhost:3000").with_timeout(0);
        assert_eq!(config.effective_timeout(), Duration::from_secs(30));
        assert!(config.effective_user_agent().starts_with("pagewise/"));
    }

    #[test]
    fn debug_hides_api_key() {
        let config = RestConfig::new("http://localhost:3000").with_api_key("secret");
        assert!(!format!("{config:?}").contains("secret"));
    }
}
