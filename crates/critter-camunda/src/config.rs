//! Engine connection configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default timeout for HTTP requests: 30 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for a Camunda 8 cluster and its OAuth server.
///
/// All fields can be supplied through the environment variables used by the
/// Camunda SaaS client credentials download (`ZEEBE_REST_ADDRESS`,
/// `CAMUNDA_CLIENT_ID`, ...).
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct CamundaConfig {
    /// Address of the cluster REST API.
    #[cfg_attr(feature = "config", arg(long = "zeebe-rest-address", env = "ZEEBE_REST_ADDRESS"))]
    pub base_url: String,

    /// Audience the access token should be valid for.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "token-audience",
            env = "CAMUNDA_TOKEN_AUDIENCE",
            default_value = "zeebe.camunda.io"
        )
    )]
    pub token_audience: String,

    /// Client ID used to request an access token.
    #[cfg_attr(feature = "config", arg(long = "client-id", env = "CAMUNDA_CLIENT_ID"))]
    pub client_id: String,

    /// Client secret used to request an access token.
    #[cfg_attr(
        feature = "config",
        arg(long = "client-secret", env = "CAMUNDA_CLIENT_SECRET", hide_env_values = true)
    )]
    pub client_secret: String,

    /// URL of the authorization server issuing access tokens.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "oauth-url",
            env = "CAMUNDA_OAUTH_URL",
            default_value = "https://login.cloud.camunda.io/oauth/token"
        )
    )]
    pub auth_url: String,

    /// HTTP request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "http-timeout", env = "CAMUNDA_HTTP_TIMEOUT", default_value = "30")
    )]
    #[serde(default = "default_timeout_secs")]
    pub http_timeout: u64,

    /// User-Agent header to send with requests
    #[cfg_attr(
        feature = "config",
        arg(long = "http-user-agent", env = "CAMUNDA_USER_AGENT")
    )]
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl std::fmt::Debug for CamundaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CamundaConfig")
            .field("base_url", &self.base_url)
            .field("token_audience", &self.token_audience)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("http_timeout", &self.http_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl CamundaConfig {
    /// Creates a configuration from the cluster address and credentials.
    pub fn new(
        base_url: impl Into<String>,
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            token_audience: "zeebe.camunda.io".to_owned(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: auth_url.into(),
            http_timeout: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        }
    }

    /// Set the token audience.
    #[must_use]
    pub fn with_token_audience(mut self, audience: impl Into<String>) -> Self {
        self.token_audience = audience.into();
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
        if self.http_timeout == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.http_timeout)
        }
    }

    /// Returns the effective user agent, using default if not set.
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .filter(|agent| !agent.is_empty())
            .unwrap_or_else(|| format!("critter/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Base URL with any trailing slash removed.
    pub(crate) fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`Configuration`](crate::ErrorKind::Configuration) error if
    /// either URL is not an absolute http(s) URL or the client credentials
    /// are empty.
    pub fn validate(&self) -> Result<()> {
        validate_http_url("base URL", &self.base_url)?;
        validate_http_url("OAuth URL", &self.auth_url)?;

        if self.client_id.trim().is_empty() {
            return Err(Error::configuration().with_message("Client ID must not be empty"));
        }

        if self.client_secret.is_empty() {
            return Err(Error::configuration().with_message("Client secret must not be empty"));
        }

        Ok(())
    }
}

fn validate_http_url(name: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| Error::from(e).with_context(format!("{name}: {value}")))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::configuration()
            .with_message(format!("{name} must use http or https, got '{scheme}'"))),
    }
}
