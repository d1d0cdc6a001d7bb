//! Credential and OAuth client identity types.

use crate::error::{AuthError, Result};
use chrono::{DateTime, Datelike, Utc};
use core_runtime::config::ClientConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth 2.0 client identity and endpoints for one tenant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Absent for public clients
    pub client_secret: Option<String>,
    /// Required only for the authorization-code flow
    pub redirect_uri: Option<String>,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthConfig {
    /// Derive the tenant's v2 endpoints and client identity from a validated
    /// [`ClientConfig`].
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_url.clone(),
            scopes: config.scopes.clone(),
            auth_url: config.authorize_url(),
            token_url: config.token_url(),
        }
    }

    /// Same identity, different scopes
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// What a credential needs to be renewed.
///
/// With a refresh token the `refresh_token` grant is used; without one the
/// client identity alone drives a `client_credentials` grant.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshMeans {
    pub config: OAuthConfig,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for RefreshMeans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshMeans")
            .field("config", &self.config)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// A bearer credential.
///
/// Never mutated in place: a refresh produces a new value that replaces the
/// old one wholesale.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub token_type: String,
    /// `None` means the token does not expire
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh: Option<RefreshMeans>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expires_at,
            refresh: None,
        }
    }

    pub fn with_refresh(mut self, refresh: RefreshMeans) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// An empty credential that is already expired.
    ///
    /// The first read through a token manager triggers a `client_credentials`
    /// grant, so construction never touches the network.
    pub fn app_only(config: OAuthConfig) -> Self {
        Self {
            access_token: String::new(),
            token_type: "Bearer".to_string(),
            expires_at: Some(DateTime::<Utc>::MIN_UTC),
            refresh: Some(RefreshMeans {
                config,
                refresh_token: None,
            }),
        }
    }

    /// Expired, or expiring within `buffer` of `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer: chrono::Duration) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        match self.expires_at {
            Some(expires_at) => match expires_at.checked_sub_signed(buffer) {
                Some(deadline) => now >= deadline,
                None => true,
            },
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh.is_some()
    }

    /// Value for the `Authorization` header
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("refresh", &self.refresh)
            .finish()
    }
}

/// Persisted token record.
///
/// ```json
/// {
///   "OAuth": {"access_token": "...", "token_type": "Bearer",
///             "refresh_token": "...", "expiry": "2024-05-01T10:00:00Z"},
///   "OAuthConfig": {"ClientID": "...", "ClientSecret": "...",
///                   "Endpoint": {"AuthURL": "...", "TokenURL": "..."},
///                   "RedirectURL": "...", "Scopes": ["..."]}
/// }
/// ```
///
/// `OAuthConfig` is optional; without it the restored credential cannot be
/// refreshed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(rename = "OAuth")]
    pub token: TokenRecord,
    #[serde(rename = "OAuthConfig", default, skip_serializing_if = "Option::is_none")]
    pub oauth_config: Option<StoredOAuthConfig>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StoredOAuthConfig {
    #[serde(rename = "ClientID")]
    pub client_id: String,
    #[serde(rename = "ClientSecret", default)]
    pub client_secret: String,
    #[serde(rename = "Endpoint")]
    pub endpoint: StoredEndpoint,
    #[serde(rename = "RedirectURL", default)]
    pub redirect_url: String,
    #[serde(rename = "Scopes", default)]
    pub scopes: Vec<String>,
}

impl fmt::Debug for StoredOAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredOAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEndpoint {
    #[serde(rename = "AuthURL", default)]
    pub auth_url: String,
    #[serde(rename = "TokenURL")]
    pub token_url: String,
}

impl CredentialRecord {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AuthError::InvalidRecord(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AuthError::InvalidRecord(e.to_string()))
    }

    /// Validate and convert into a [`Credential`].
    pub fn into_credential(self) -> Result<Credential> {
        if self.token.access_token.is_empty() && self.oauth_config.is_none() {
            return Err(AuthError::InvalidRecord(
                "record has neither an access token nor an OAuth config".to_string(),
            ));
        }

        // A zero timestamp ("0001-01-01T00:00:00Z") marks a non-expiring token
        let expires_at = self.token.expiry.filter(|expiry| expiry.year() > 1);

        let refresh = match self.oauth_config {
            Some(stored) => {
                if stored.endpoint.token_url.is_empty() {
                    return Err(AuthError::InvalidRecord(
                        "OAuthConfig.Endpoint.TokenURL is empty".to_string(),
                    ));
                }
                Some(RefreshMeans {
                    config: OAuthConfig {
                        client_id: stored.client_id,
                        client_secret: Some(stored.client_secret).filter(|s| !s.is_empty()),
                        redirect_uri: Some(stored.redirect_url).filter(|s| !s.is_empty()),
                        scopes: stored.scopes,
                        auth_url: stored.endpoint.auth_url,
                        token_url: stored.endpoint.token_url,
                    },
                    refresh_token: self.token.refresh_token.filter(|t| !t.is_empty()),
                })
            }
            None => None,
        };

        Ok(Credential {
            access_token: self.token.access_token,
            token_type: self
                .token
                .token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
            refresh,
        })
    }

    /// Snapshot a credential for persistence
    pub fn from_credential(credential: &Credential) -> Self {
        let refresh_token = credential
            .refresh
            .as_ref()
            .and_then(|means| means.refresh_token.clone());

        Self {
            token: TokenRecord {
                access_token: credential.access_token.clone(),
                token_type: Some(credential.token_type.clone()),
                refresh_token,
                expiry: credential.expires_at,
            },
            oauth_config: credential.refresh.as_ref().map(|means| StoredOAuthConfig {
                client_id: means.config.client_id.clone(),
                client_secret: means.config.client_secret.clone().unwrap_or_default(),
                endpoint: StoredEndpoint {
                    auth_url: means.config.auth_url.clone(),
                    token_url: means.config.token_url.clone(),
                },
                redirect_url: means.config.redirect_uri.clone().unwrap_or_default(),
                scopes: means.config.scopes.clone(),
            }),
        }
    }
}
