//! OAuth2 client-credentials token acquisition.

use jiff::{SignedDuration, Timestamp};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use crate::client::CamundaClient;
use crate::error::{Error, ErrorKind, Result};

/// Tracing target for token operations.
pub const TRACING_TARGET: &str = "critter_camunda::auth";

/// Tokens are treated as expired this long before the issuer says so.
const EXPIRY_LEEWAY: SignedDuration = SignedDuration::from_secs(30);

/// Short-lived bearer token for engine calls.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<Timestamp>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Wraps a raw bearer token without a known expiry.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_at: None,
        }
    }

    /// Sets the instant after which the token is no longer accepted.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns the raw bearer token.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Returns the expiry instant reported by the issuer, if any.
    #[must_use]
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    /// Returns `true` if the token is known to be expired at `now`.
    ///
    /// Tokens without a recorded expiry are never considered expired; their
    /// validity has to be checked against the engine. An expiry too close to
    /// the minimum timestamp to apply the leeway counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| {
            expires_at
                .checked_sub(EXPIRY_LEEWAY)
                .ok()
                .is_none_or(|limit| now >= limit)
        })
    }

    /// Returns `true` if the token is known to be expired now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Timestamp::now())
    }
}

/// Form body of a client-credentials grant.
#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    audience: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

/// Successful response of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_token(self, issued_at: Timestamp) -> Result<AccessToken> {
        if self.access_token.is_empty() {
            return Err(Error::authentication().with_message("Token endpoint returned an empty token"));
        }

        let token = AccessToken::new(self.access_token);
        match self.expires_in {
            Some(seconds) if seconds > 0 => {
                let expires_at = issued_at
                    .checked_add(SignedDuration::from_secs(seconds))
                    .map_err(|e| Error::from_source(ErrorKind::Serialization, e))?;
                Ok(token.with_expires_at(expires_at))
            }
            _ => Ok(token),
        }
    }
}

impl CamundaClient {
    /// Requests a new access token from the authorization server.
    ///
    /// On success the token is installed on the client and returned.
    ///
    /// # Errors
    ///
    /// Returns an [`Authentication`](ErrorKind::Authentication) error if the
    /// server rejects the credentials and a network error if it cannot be
    /// reached.
    pub async fn get_token(&self) -> Result<AccessToken> {
        let config = self.config();
        let form = TokenRequest {
            grant_type: "client_credentials",
            audience: &config.token_audience,
            client_id: &config.client_id,
            client_secret: &config.client_secret,
        };

        tracing::debug!(
            target: TRACING_TARGET,
            auth_url = %config.auth_url,
            audience = %config.token_audience,
            client_id = %config.client_id,
            "Requesting access token"
        );

        let issued_at = Timestamp::now();
        let response = self
            .http()
            .post(&config.auth_url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    target: TRACING_TARGET,
                    auth_url = %config.auth_url,
                    error = %e,
                    "Failed to connect to authorization server"
                );
                Error::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                target: TRACING_TARGET,
                status = status.as_u16(),
                body = %body,
                "Failed to authenticate"
            );

            let mut error = Error::from_status(status, body).with_message(format!(
                "Failed to authenticate. Status Code: {}",
                status.as_u16()
            ));
            error.kind = ErrorKind::Authentication;
            return Err(error);
        }

        let response: TokenResponse = response.json().await?;
        tracing::info!(
            target: TRACING_TARGET,
            token_type = response.token_type.as_deref().unwrap_or("unknown"),
            expires_in = response.expires_in,
            "Access token acquired"
        );

        let token = response.into_token(issued_at)?;
        self.set_access_token(token.clone()).await;
        Ok(token)
    }
}
