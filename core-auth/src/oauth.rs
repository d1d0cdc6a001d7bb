//! OAuth 2.0 Token Endpoint Client with PKCE Support
//!
//! Implements the grants used against the Microsoft identity platform v2
//! endpoints (RFC 6749, RFC 7636):
//!
//! - Authorization URL with PKCE challenge and CSRF state
//! - `authorization_code` exchange
//! - `refresh_token` grant
//! - `client_credentials` grant for app-only tokens
//!
//! Every successful grant yields a [`Credential`] carrying the means to
//! renew itself, so a [`crate::TokenManager`] can keep it valid.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::OAuthFlowManager;
//! use core_auth::OAuthConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig {
//!     client_id: "your-client-id".to_string(),
//!     client_secret: Some("your-client-secret".to_string()),
//!     redirect_uri: Some("http://localhost:8080/callback".to_string()),
//!     scopes: vec!["offline_access".to_string(), "Files.ReadWrite.All".to_string()],
//!     auth_url: "https://login.microsoftonline.com/contoso/oauth2/v2.0/authorize".to_string(),
//!     token_url: "https://login.microsoftonline.com/contoso/oauth2/v2.0/token".to_string(),
//! };
//!
//! let flow_manager = OAuthFlowManager::new(config, http_client);
//! let (auth_url, pkce_verifier) = flow_manager.build_auth_url()?;
//! // Redirect user to auth_url...
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{Credential, OAuthConfig, RefreshMeans};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// PKCE (Proof Key for Code Exchange) verifier.
///
/// Keep it for the duration of the authorization flow; only the challenge
/// derived from it is sent to the authorization endpoint.
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Create a verifier from 32 random bytes and a 16-byte CSRF state, both
    /// URL-safe base64 without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// S256 challenge: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for one tenant's token and authorization endpoints.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
            clock: Arc::new(SystemClock),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Clock used to turn `expires_in` into an absolute expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Retry budget for 5xx responses from the token endpoint
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL the user should visit.
    ///
    /// Returns the URL and the verifier that must be presented to
    /// [`exchange_code`](Self::exchange_code).
    ///
    /// # Errors
    ///
    /// Fails if no redirect URI is configured or the authorization URL does
    /// not parse.
    #[instrument(skip(self), fields(client_id = %self.config.client_id))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let redirect_uri = self.redirect_uri()?;
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("response_mode", "query")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", verifier.state())
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        debug!("Built authorization URL");

        Ok((url.to_string(), verifier))
    }

    /// Exchange an authorization code for a refreshable credential.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StateMismatch`] when the callback state is not ours
    /// - [`AuthError::InvalidAuthCode`] when the endpoint rejects the code
    /// - [`AuthError::NetworkError`] on transport failure
    #[instrument(skip(self, code, verifier), fields(client_id = %self.config.client_id))]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        verifier: &PkceVerifier,
    ) -> Result<Credential> {
        if state != verifier.state() {
            warn!("OAuth state mismatch on authorization callback");
            return Err(AuthError::StateMismatch {
                expected: verifier.state().to_string(),
                actual: state.to_string(),
            });
        }

        let redirect_uri = self.redirect_uri()?;
        let scopes = self.scopes_param();
        let params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", verifier.verifier()),
            ("scope", scopes.as_str()),
        ];

        debug!("Exchanging authorization code for tokens");

        let response = self.post_form(params).await?;
        if !response.is_success() {
            return Err(AuthError::InvalidAuthCode(describe_failure(&response)));
        }

        let token_response = parse_token_response(&response)?;
        info!(
            expires_in = token_response.expires_in,
            "Exchanged authorization code for tokens"
        );

        self.credential_from(token_response, None, &self.config)
    }

    /// Renew an access token with a refresh token.
    ///
    /// The returned credential keeps the old refresh token when the endpoint
    /// does not rotate it. 4xx responses fail immediately; 5xx responses are
    /// retried with exponential backoff.
    #[instrument(skip(self, refresh_token), fields(client_id = %self.config.client_id))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<Credential> {
        let scopes = self.scopes_param();
        let params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", scopes.as_str()),
        ];

        debug!("Refreshing access token");

        let token_response = self.request_with_retry(params).await?;
        info!(
            expires_in = token_response.expires_in,
            "Refreshed access token"
        );

        self.credential_from(token_response, Some(refresh_token), &self.config)
    }

    /// Acquire an app-only token for `scopes`.
    ///
    /// The credential renews itself through the same grant, so it needs the
    /// client secret.
    #[instrument(skip(self), fields(client_id = %self.config.client_id))]
    pub async fn client_credentials(&self, scopes: &[String]) -> Result<Credential> {
        if self.config.client_secret.is_none() {
            return Err(AuthError::InvalidConfig(
                "client_credentials grant requires a client secret".to_string(),
            ));
        }

        let scope = scopes.join(" ");
        let params = vec![("grant_type", "client_credentials"), ("scope", scope.as_str())];

        debug!("Requesting app-only token");

        let token_response = self.request_with_retry(params).await?;
        info!(
            expires_in = token_response.expires_in,
            "Acquired app-only token"
        );

        let config = self.config.clone().with_scopes(scopes.iter().cloned());
        self.credential_from(token_response, None, &config)
    }

    fn redirect_uri(&self) -> Result<&str> {
        self.config.redirect_uri.as_deref().ok_or_else(|| {
            AuthError::InvalidConfig("redirect URI is required for the authorization-code flow".to_string())
        })
    }

    fn scopes_param(&self) -> String {
        self.config.scopes.join(" ")
    }

    fn credential_from(
        &self,
        response: TokenResponse,
        previous_refresh_token: Option<&str>,
        config: &OAuthConfig,
    ) -> Result<Credential> {
        let expires_at = chrono::Duration::try_seconds(response.expires_in)
            .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::TokenRefreshFailed(format!(
                    "expires_in out of range: {}",
                    response.expires_in
                ))
            })?;
        let refresh_token = response
            .refresh_token
            .or_else(|| previous_refresh_token.map(str::to_string));

        Ok(Credential {
            access_token: response.access_token,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: Some(expires_at),
            refresh: Some(RefreshMeans {
                config: config.clone(),
                refresh_token,
            }),
        })
    }

    async fn post_form<'a>(&'a self, mut params: Vec<(&'a str, &'a str)>) -> Result<HttpResponse> {
        params.push(("client_id", self.config.client_id.as_str()));
        if let Some(client_secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", client_secret));
        }

        let encoded_body = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        // One attempt per call; request_with_retry owns the retry budget
        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(Bytes::from(encoded_body));

        self.http_client
            .execute_with_retry(request, RetryPolicy::single_attempt())
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))
    }

    async fn request_with_retry<'a>(
        &'a self,
        params: Vec<(&'a str, &'a str)>,
    ) -> Result<TokenResponse> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let response = self.post_form(params.clone()).await?;

            if response.is_success() {
                return parse_token_response(&response);
            }

            let status = response.status;

            if response.is_client_error() {
                let failure = describe_failure(&response);
                warn!(status, error = %failure, "Token request rejected");
                return Err(AuthError::TokenRefreshFailed(failure));
            }

            if attempt >= max_attempts {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token request failed after {} attempts. Last error: {}",
                    attempt,
                    describe_failure(&response)
                )));
            }

            let delay = self.retry_policy.delay_for(attempt);
            warn!(
                status,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Token request failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

/// Token endpoint error body (RFC 6749 §5.2 plus Azure AD extras)
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn describe_failure(response: &HttpResponse) -> String {
    match response.json::<TokenErrorResponse>() {
        Ok(body) => format!(
            "Token endpoint returned {} {}: {}",
            response.status,
            body.error,
            body.error_description.unwrap_or_default()
        ),
        Err(_) => format!(
            "Token endpoint returned {}: {}",
            response.status,
            response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string())
        ),
    }
}

fn parse_token_response(response: &HttpResponse) -> Result<TokenResponse> {
    response
        .json()
        .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))
}

/// Token response from the identity platform.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in", deserialize_with = "lenient_seconds")]
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// Accept `expires_in` as a number or a numeric string (v1 endpoints send
/// strings).
fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
