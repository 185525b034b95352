//! Cached access tokens and the token validity check.
//!
//! A [`TokenSession`] keeps the last token in a [`TokenStore`] so that
//! successive requests (or successive CLI invocations) reuse it. Before a
//! cached token is used it is either rejected by its recorded expiry or
//! probed against the engine's topology endpoint.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use strum::{AsRefStr, Display};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::auth::AccessToken;
use crate::client::CamundaClient;
use crate::error::{Error, ErrorKind, Result};

/// Tracing target for session operations.
pub const TRACING_TARGET: &str = "critter_camunda::session";

/// Message reported when the validity probe could not reach the engine.
pub const VALIDITY_CHECK_FAILED: &str = "Failed to check for token validity or token invalid.";

/// Message reported when no new token could be acquired.
pub const TOKEN_REFRESH_FAILED: &str = "Failed to get token.";

/// Storage for the cached access token.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the cached token, if any.
    async fn load(&self) -> Result<Option<AccessToken>>;

    /// Replaces the cached token.
    async fn store(&self, token: &AccessToken) -> Result<()>;

    /// Removes the cached token.
    async fn clear(&self) -> Result<()>;
}

/// Token store living in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding a token.
    pub fn with_token(token: AccessToken) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token))),
        }
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<AccessToken>> {
        Ok(self.token.lock().await.clone())
    }

    async fn store(&self, token: &AccessToken) -> Result<()> {
        *self.token.lock().await = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.token.lock().await = None;
        Ok(())
    }
}

/// Token store persisted as a JSON file.
///
/// A missing or unreadable file is treated as an empty cache. Writes go to a
/// sibling file that is renamed into place; on Unix the cache is readable by
/// its owner only (mode `0600`).
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Creates a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file written before being renamed over the cache.
    fn staging_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".tmp");
        PathBuf::from(path)
    }
}

#[async_trait::async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<AccessToken>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring corrupt token cache"
                );
                Ok(None)
            }
        }
    }

    async fn store(&self, token: &AccessToken) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec(token)?;
        let staging = self.staging_path();

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&staging).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // A leftover staging file keeps the mode it was created with.
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        file.write_all(&content).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// How [`TokenSession::ensure_token`] obtained a usable token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TokenStatus {
    /// The cached token was accepted by the engine.
    Cached,
    /// A new token was acquired and cached.
    Refreshed,
}

/// Pairs an engine client with a token cache.
#[derive(Clone)]
pub struct TokenSession {
    client: CamundaClient,
    store: Arc<dyn TokenStore>,
}

impl std::fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSession")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl TokenSession {
    /// Creates a session for `client` caching tokens in `store`.
    pub fn new(client: CamundaClient, store: impl TokenStore + 'static) -> Self {
        Self {
            client,
            store: Arc::new(store),
        }
    }

    /// Returns the engine client.
    pub fn client(&self) -> &CamundaClient {
        &self.client
    }

    /// Makes sure the client holds a valid access token.
    ///
    /// A cached token is installed on the client and probed against the
    /// engine. Tokens that are missing, known to be expired, or rejected by
    /// the probe are replaced by a freshly acquired one.
    ///
    /// # Errors
    ///
    /// Fails with [`VALIDITY_CHECK_FAILED`] if the probe cannot reach the
    /// engine, and with [`TOKEN_REFRESH_FAILED`] if no new token could be
    /// acquired.
    pub async fn ensure_token(&self) -> Result<TokenStatus> {
        match self.load_cached().await {
            None => {
                tracing::info!(target: TRACING_TARGET, "Token not found");
            }
            Some(token) if token.is_expired() => {
                tracing::info!(
                    target: TRACING_TARGET,
                    expires_at = ?token.expires_at(),
                    "Cached token expired"
                );
            }
            Some(token) => {
                tracing::info!(target: TRACING_TARGET, "Found token in session");
                self.client.set_access_token(token).await;

                let valid = self.client.verify_token().await.map_err(|e| {
                    Error::new(e.kind)
                        .with_message(VALIDITY_CHECK_FAILED)
                        .with_source(e)
                })?;

                if valid {
                    tracing::info!(target: TRACING_TARGET, "Token still valid");
                    return Ok(TokenStatus::Cached);
                }

                tracing::info!(target: TRACING_TARGET, "Token invalid");
            }
        }

        self.refresh().await
    }

    /// Acquires a new token unconditionally and caches it.
    pub async fn refresh(&self) -> Result<TokenStatus> {
        self.client.clear_access_token().await;

        let token = self.client.get_token().await.map_err(|e| {
            Error::new(ErrorKind::Authentication)
                .with_message(TOKEN_REFRESH_FAILED)
                .with_source(e)
        })?;

        if let Err(e) = self.store.store(&token).await {
            tracing::warn!(
                target: TRACING_TARGET,
                error = %e,
                "Failed to cache access token"
            );
        }

        tracing::info!(target: TRACING_TARGET, "Token refreshed");
        Ok(TokenStatus::Refreshed)
    }

    /// Drops the cached token and the token held by the client.
    pub async fn invalidate(&self) -> Result<()> {
        self.client.clear_access_token().await;
        self.store.clear().await
    }

    async fn load_cached(&self) -> Option<AccessToken> {
        match self.store.load().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %e,
                    "Failed to read token cache"
                );
                None
            }
        }
    }
}
