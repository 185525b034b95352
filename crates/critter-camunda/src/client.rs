//! Reqwest-based client for the Camunda 8 REST API.

use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use url::Url;

use crate::auth::AccessToken;
use crate::config::CamundaConfig;
use crate::error::{Error, Result};

/// Tracing target for engine client operations.
pub const TRACING_TARGET: &str = "critter_camunda::client";

/// Inner client that holds the HTTP client, configuration and current token.
struct CamundaClientInner {
    http: Client,
    config: CamundaConfig,
    api_url: Url,
    token: RwLock<Option<AccessToken>>,
}

/// Client for a single Camunda 8 cluster.
///
/// The client is cheap to clone; clones share the HTTP connection pool and
/// the current access token. Engine operations are implemented in the
/// `auth`, `topology`, `deployment`, `process`, `job` and `variable`
/// modules.
///
/// # Examples
///
/// ```rust,ignore
/// use critter_camunda::{CamundaClient, CamundaConfig};
///
/// let config = CamundaConfig::new(base_url, auth_url, client_id, client_secret);
/// let client = CamundaClient::new(config)?;
///
/// client.get_token().await?;
/// let created = client
///     .create_process_instance("Process_AnimalImageRetrieval", variables)
///     .await?;
/// ```
#[derive(Clone)]
pub struct CamundaClient {
    inner: Arc<CamundaClientInner>,
}

impl std::fmt::Debug for CamundaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CamundaClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl CamundaClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: CamundaConfig) -> Result<Self> {
        let timeout = config.effective_timeout();
        let user_agent = config.effective_user_agent();

        tracing::debug!(
            target: TRACING_TARGET,
            base_url = %config.base_url,
            timeout_ms = timeout.as_millis(),
            "Creating engine client"
        );

        config.validate()?;
        let api_url = Url::parse(config.api_root())?;

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(&user_agent)
            .build()?;

        let inner = CamundaClientInner {
            http,
            config,
            api_url,
            token: RwLock::new(None),
        };

        tracing::info!(
            target: TRACING_TARGET,
            "Engine client created successfully"
        );

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &CamundaConfig {
        &self.inner.config
    }

    /// Gets the underlying HTTP client.
    pub(crate) fn http(&self) -> &Client {
        &self.inner.http
    }

    /// Returns the access token currently used for engine calls.
    pub async fn access_token(&self) -> Option<AccessToken> {
        self.inner.token.read().await.clone()
    }

    /// Replaces the access token used for engine calls.
    pub async fn set_access_token(&self, token: AccessToken) {
        *self.inner.token.write().await = Some(token);
    }

    /// Drops the current access token.
    pub async fn clear_access_token(&self) {
        *self.inner.token.write().await = None;
    }

    /// Builds the absolute URL of an engine endpoint below `/v2`.
    ///
    /// Every segment is percent-encoded, so keys cannot alter the path.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::configuration().with_message("Engine address cannot be used as a base URL")
            })?
            .pop_if_empty()
            .push("v2")
            .extend(segments);
        Ok(url)
    }

    /// Starts an authenticated request with the bearer token and `Accept`
    /// header but no content type.
    async fn authorized(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let token = self.access_token().await.ok_or_else(|| {
            Error::authentication().with_message("No access token, call get_token first")
        })?;

        let url = self.endpoint(segments)?;

        tracing::trace!(
            target: TRACING_TARGET,
            %method,
            %url,
            "Preparing engine request"
        );

        Ok(self
            .http()
            .request(method, url)
            .bearer_auth(token.secret())
            .header(ACCEPT, "application/json"))
    }

    /// Starts an authenticated JSON request against an engine endpoint.
    ///
    /// Fails with an authentication error when no token has been acquired,
    /// before anything is sent.
    pub(crate) async fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<RequestBuilder> {
        Ok(self
            .authorized(method, segments)
            .await?
            .header(CONTENT_TYPE, "application/json"))
    }

    /// Starts an authenticated request carrying a JSON body.
    pub(crate) async fn request_json<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<RequestBuilder>
    where
        B: serde::Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body)?;
        Ok(self.request(method, segments).await?.body(body))
    }

    /// Starts an authenticated multipart request; the content type carries
    /// the form boundary.
    pub(crate) async fn request_multipart(
        &self,
        method: Method,
        segments: &[&str],
        form: reqwest::multipart::Form,
    ) -> Result<RequestBuilder> {
        Ok(self.authorized(method, segments).await?.multipart(form))
    }

    /// Sends a request and decodes a JSON response body.
    pub(crate) async fn send_json<T>(&self, request: RequestBuilder, operation: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request, operation).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            Error::from(e).with_context(format!("Unexpected response body for {operation}"))
        })
    }

    /// Sends a request whose success response carries no body of interest.
    pub(crate) async fn send_empty(&self, request: RequestBuilder, operation: &str) -> Result<()> {
        self.send(request, operation).await.map(drop)
    }

    /// Sends a request and turns non-success statuses into errors.
    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET,
                operation,
                error = %e,
                "Failed to connect to engine"
            );
            Error::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                target: TRACING_TARGET,
                operation,
                status = status.as_u16(),
                "Engine request succeeded"
            );
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable>".to_owned());

        tracing::warn!(
            target: TRACING_TARGET,
            operation,
            status = status.as_u16(),
            body = %body,
            "Engine request failed"
        );

        Err(Error::from_status(status, body).with_message(format!("Failed to {operation}")))
    }
}
