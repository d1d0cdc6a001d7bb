//! # Token Lifecycle Manager
//!
//! Keeps one bearer credential valid across any number of calls.
//!
//! ## Overview
//!
//! [`TokenManager`] owns the credential behind an `RwLock<Arc<Credential>>`.
//! Readers clone the `Arc` and never block each other. When the credential is
//! expired (or within the refresh buffer of expiry) the reader takes the
//! refresh lock, re-checks, and only then calls the token endpoint, so N
//! concurrent callers produce exactly one refresh request. A refresh swaps in
//! a whole new `Arc`; callers holding the old one keep a consistent value.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{CredentialRecord, TokenManager};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(http: Arc<dyn bridge_traits::HttpClient>) -> core_auth::Result<()> {
//! let record = CredentialRecord::from_json(&std::fs::read_to_string("token.json").unwrap())?;
//! let tokens = TokenManager::from_record(record, http)?;
//!
//! let (name, value) = tokens.authorization_header(&CancellationToken::new()).await?;
//! assert_eq!(name, "Authorization");
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::oauth::OAuthFlowManager;
use crate::types::{Credential, CredentialRecord, OAuthConfig};
use bridge_traits::http::HttpClient;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::config::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default window before expiry in which a credential is already treated as
/// expired
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(10);

/// Upper bound on one refresh round trip, retries included
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(120);

pub struct TokenManager {
    credential: RwLock<Arc<Credential>>,
    refresh_lock: Mutex<()>,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    refresh_buffer: Duration,
    refresh_timeout: Duration,
}

impl TokenManager {
    pub fn new(credential: Credential, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            credential: RwLock::new(Arc::new(credential)),
            refresh_lock: Mutex::new(()),
            http_client,
            clock: Arc::new(SystemClock),
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    /// Restore from a persisted record.
    ///
    /// A record without an OAuth config is usable until it expires, then
    /// every read fails with [`AuthError::NoRefreshCapability`].
    pub fn from_record(record: CredentialRecord, http_client: Arc<dyn HttpClient>) -> Result<Self> {
        let credential = record.into_credential()?;
        if !credential.can_refresh() {
            warn!("Restored credential has no OAuth config and cannot be refreshed");
        }
        Ok(Self::new(credential, http_client))
    }

    /// App-only manager for the configured tenant.
    ///
    /// No network call happens here; the first read acquires a token through
    /// the `client_credentials` grant.
    pub fn app_only(config: &ClientConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self::app_only_with_scopes(config, config.scopes.clone(), http_client)
    }

    /// App-only manager requesting `scopes` instead of the configured ones
    pub fn app_only_with_scopes(
        config: &ClientConfig,
        scopes: Vec<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        let oauth = OAuthConfig::from_client_config(config).with_scopes(scopes);
        Self::new(Credential::app_only(oauth), http_client)
            .with_refresh_buffer(config.token_refresh_buffer)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Default: 10 seconds
    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    /// Default: 2 minutes
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Return a currently valid credential, refreshing it when needed.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoRefreshCapability`] if expired with nothing to refresh with
    /// - [`AuthError::Cancelled`] if `cancel` fires first
    /// - Token endpoint failures from the refresh itself
    #[instrument(skip(self, cancel))]
    pub async fn current_credential(&self, cancel: &CancellationToken) -> Result<Arc<Credential>> {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let current = self.snapshot().await;
        if !self.is_expired(&current) {
            return Ok(current);
        }

        let _guard = tokio::select! {
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            guard = self.refresh_lock.lock() => guard,
        };

        // Another caller may have refreshed while we waited
        let current = self.snapshot().await;
        if !self.is_expired(&current) {
            debug!("Credential refreshed by a concurrent caller");
            return Ok(current);
        }

        self.refresh_locked(&current, cancel).await
    }

    /// Refresh unconditionally, e.g. after the server rejected the token.
    #[instrument(skip(self, cancel))]
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<Arc<Credential>> {
        let _guard = tokio::select! {
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            guard = self.refresh_lock.lock() => guard,
        };

        let current = self.snapshot().await;
        self.refresh_locked(&current, cancel).await
    }

    /// `("Authorization", "Bearer <token>")` for the current credential
    pub async fn authorization_header(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(&'static str, String)> {
        let credential = self.current_credential(cancel).await?;
        Ok(("Authorization", credential.authorization_value()))
    }

    /// Persistable snapshot of the held credential
    pub async fn to_record(&self) -> CredentialRecord {
        let snapshot = self.snapshot().await;
        CredentialRecord::from_credential(&snapshot)
    }

    async fn snapshot(&self) -> Arc<Credential> {
        self.credential.read().await.clone()
    }

    fn is_expired(&self, credential: &Credential) -> bool {
        let buffer =
            chrono::Duration::from_std(self.refresh_buffer).unwrap_or_else(|_| chrono::Duration::zero());
        credential.is_expired_at(self.clock.now(), buffer)
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh_locked(
        &self,
        current: &Credential,
        cancel: &CancellationToken,
    ) -> Result<Arc<Credential>> {
        let means = current.refresh.as_ref().ok_or_else(|| {
            warn!("Credential expired and cannot be refreshed");
            AuthError::NoRefreshCapability
        })?;

        let flow = OAuthFlowManager::new(means.config.clone(), self.http_client.clone())
            .with_clock(self.clock.clone());

        info!(
            grant = if means.refresh_token.is_some() { "refresh_token" } else { "client_credentials" },
            "Refreshing credential"
        );

        let exchange = async {
            match means.refresh_token.as_deref() {
                Some(refresh_token) => flow.refresh_access_token(refresh_token).await,
                None => flow.client_credentials(&means.config.scopes).await,
            }
        };

        let refreshed = tokio::select! {
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            outcome = tokio::time::timeout(self.refresh_timeout, exchange) => match outcome {
                Ok(result) => result?,
                Err(_) => {
                    warn!("Token refresh timed out");
                    return Err(AuthError::TokenRefreshFailed("token refresh timed out".to_string()));
                }
            },
        };

        let refreshed = Arc::new(refreshed);
        *self.credential.write().await = refreshed.clone();

        debug!(expires_at = ?refreshed.expires_at, "Credential replaced");
        Ok(refreshed)
    }
}
