//! # Client Configuration Module
//!
//! Provides configuration for the Microsoft Graph transfer client.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `ClientConfig` holding the application identity, the service endpoints and
//! the upload sizing. `build()` validates everything up front so a bad
//! tenant id or a misaligned chunk size fails at startup, not halfway through
//! an upload.
//!
//! Endpoints default to the public Microsoft cloud. Tests point them at mock
//! hosts instead:
//!
//! ```
//! use core_runtime::config::{ClientConfig, Endpoints};
//!
//! let config = ClientConfig::builder()
//!     .tenant_id("contoso.onmicrosoft.com")
//!     .client_id("11111111-2222-3333-4444-555555555555")
//!     .client_secret("secret")
//!     .endpoints(Endpoints {
//!         auth_host: "http://127.0.0.1:9000/".to_string(),
//!         graph_host: "http://127.0.0.1:9001".to_string(),
//!         powerbi_host: "http://127.0.0.1:9002".to_string(),
//!     })
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.endpoints.graph_host, "http://127.0.0.1:9001");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::ClientConfig;
//!
//! // Missing tenant and client id
//! let config = ClientConfig::builder()
//!     .build()
//!     .expect("Should fail - missing application identity");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Byte alignment every upload-session chunk must respect (320 KiB)
pub const UPLOAD_CHUNK_ALIGNMENT: u64 = 320 * 1024;

/// Files strictly smaller than this use a single PUT (4 MiB)
pub const SMALL_FILE_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Default chunk size: 100 aligned units per commit window
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * UPLOAD_CHUNK_ALIGNMENT;

/// Default Microsoft Graph scope for app and delegated tokens
pub const DEFAULT_GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Default SharePoint site
pub const DEFAULT_SITE_ID: &str = "root";

/// Display name of the default SharePoint document library
pub const DEFAULT_SHARED_DOCUMENTS: &str = "Shared Documents";

/// Service hosts the client talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Identity platform host, e.g. `https://login.microsoftonline.com/`
    pub auth_host: String,
    /// Microsoft Graph host, e.g. `https://graph.microsoft.com`
    pub graph_host: String,
    /// Power BI REST host, e.g. `https://api.powerbi.com`
    pub powerbi_host: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_host: "https://login.microsoftonline.com/".to_string(),
            graph_host: "https://graph.microsoft.com".to_string(),
            powerbi_host: "https://api.powerbi.com".to_string(),
        }
    }
}

impl Endpoints {
    /// OAuth 2.0 v2 token endpoint for a tenant
    pub fn token_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.auth_host.trim_end_matches('/'),
            tenant_id
        )
    }

    /// OAuth 2.0 v2 authorization endpoint for a tenant
    pub fn authorize_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/authorize",
            self.auth_host.trim_end_matches('/'),
            tenant_id
        )
    }

    /// Graph `v1.0` base URL without trailing slash
    pub fn graph_v1(&self) -> String {
        format!("{}/v1.0", self.graph_host.trim_end_matches('/'))
    }

    /// Power BI `v1.0/myorg` base URL without trailing slash
    pub fn powerbi_myorg(&self) -> String {
        format!("{}/v1.0/myorg", self.powerbi_host.trim_end_matches('/'))
    }
}

/// Upload strategy sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Sizes strictly below this go through the direct PUT
    pub small_file_threshold: u64,
    /// Bytes per chunk commit; a non-zero multiple of [`UPLOAD_CHUNK_ALIGNMENT`]
    pub chunk_size: u64,
    /// Attempts per chunk before the upload is abandoned
    pub chunk_max_attempts: u32,
    /// Base delay for exponential backoff between chunk attempts
    pub retry_base_delay: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            small_file_threshold: SMALL_FILE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_max_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

impl UploadConfig {
    /// Validate chunk alignment and retry budget
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size % UPLOAD_CHUNK_ALIGNMENT != 0 {
            return Err(Error::InvalidField {
                field: "chunk_size",
                message: format!(
                    "{} is not a non-zero multiple of {} bytes",
                    self.chunk_size, UPLOAD_CHUNK_ALIGNMENT
                ),
            });
        }

        if self.small_file_threshold == 0 {
            return Err(Error::InvalidField {
                field: "small_file_threshold",
                message: "must be at least one byte so empty files take the direct upload".to_string(),
            });
        }

        if self.chunk_max_attempts == 0 {
            return Err(Error::InvalidField {
                field: "chunk_max_attempts",
                message: "at least one attempt is required".to_string(),
            });
        }

        Ok(())
    }
}

/// Client configuration.
///
/// Use [`ClientConfigBuilder`] to construct instances.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Azure AD tenant (GUID or domain)
    pub tenant_id: String,

    /// Application (client) id
    pub client_id: String,

    /// Client secret for confidential clients
    pub client_secret: Option<String>,

    /// Redirect URL registered for the authorization-code flow
    pub redirect_url: Option<String>,

    /// Scopes requested for Graph tokens
    pub scopes: Vec<String>,

    /// Service hosts
    pub endpoints: Endpoints,

    /// SharePoint site id used for item paths
    pub site_id: String,

    /// Name of the SharePoint list backing the document library
    pub shared_documents_name: String,

    /// Upload sizing
    pub upload: UploadConfig,

    /// Credentials expiring within this window are treated as expired
    pub token_refresh_buffer: Duration,

    /// Per-request timeout passed down to the HTTP client
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("endpoints", &self.endpoints)
            .field("site_id", &self.site_id)
            .field("shared_documents_name", &self.shared_documents_name)
            .field("upload", &self.upload)
            .field("token_refresh_buffer", &self.token_refresh_buffer)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a new builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(Error::Config(
                "Tenant id is required. Use .tenant_id() to set it.".to_string(),
            ));
        }

        if self.client_id.trim().is_empty() {
            return Err(Error::Config(
                "Client id is required. Use .client_id() to set it.".to_string(),
            ));
        }

        for (field, host) in [
            ("auth_host", &self.endpoints.auth_host),
            ("graph_host", &self.endpoints.graph_host),
            ("powerbi_host", &self.endpoints.powerbi_host),
        ] {
            if !(host.starts_with("https://") || host.starts_with("http://")) {
                return Err(Error::InvalidField {
                    field,
                    message: format!("'{}' is not an http(s) URL", host),
                });
            }
        }

        if self.scopes.is_empty() {
            return Err(Error::InvalidField {
                field: "scopes",
                message: "at least one scope is required".to_string(),
            });
        }

        if self.site_id.trim().is_empty() {
            return Err(Error::InvalidField {
                field: "site_id",
                message: "must not be empty".to_string(),
            });
        }

        self.upload.validate()
    }

    /// Token endpoint for the configured tenant
    pub fn token_url(&self) -> String {
        self.endpoints.token_url(&self.tenant_id)
    }

    /// Authorization endpoint for the configured tenant
    pub fn authorize_url(&self) -> String {
        self.endpoints.authorize_url(&self.tenant_id)
    }
}

/// Builder for constructing [`ClientConfig`] instances.
#[derive(Default)]
pub struct ClientConfigBuilder {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_url: Option<String>,
    scopes: Option<Vec<String>>,
    endpoints: Option<Endpoints>,
    site_id: Option<String>,
    shared_documents_name: Option<String>,
    upload: Option<UploadConfig>,
    token_refresh_buffer: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn redirect_url(mut self, redirect_url: impl Into<String>) -> Self {
        self.redirect_url = Some(redirect_url.into());
        self
    }

    /// Replaces the default scope list.
    ///
    /// Default: `https://graph.microsoft.com/.default`
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Default: `root`
    pub fn site_id(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    /// Default: `Shared Documents`
    pub fn shared_documents_name(mut self, name: impl Into<String>) -> Self {
        self.shared_documents_name = Some(name.into());
        self
    }

    pub fn upload(mut self, upload: UploadConfig) -> Self {
        self.upload = Some(upload);
        self
    }

    /// Default: 10 seconds
    pub fn token_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.token_refresh_buffer = Some(buffer);
        self
    }

    /// Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant or client id is missing, an endpoint is
    /// not an http(s) URL, or the upload sizing is invalid.
    pub fn build(self) -> Result<ClientConfig> {
        let tenant_id = self.tenant_id.ok_or_else(|| {
            Error::Config("Tenant id is required. Use .tenant_id() to set it.".to_string())
        })?;

        let client_id = self.client_id.ok_or_else(|| {
            Error::Config("Client id is required. Use .client_id() to set it.".to_string())
        })?;

        let config = ClientConfig {
            tenant_id,
            client_id,
            client_secret: self.client_secret,
            redirect_url: self.redirect_url,
            scopes: self
                .scopes
                .unwrap_or_else(|| vec![DEFAULT_GRAPH_SCOPE.to_string()]),
            endpoints: self.endpoints.unwrap_or_default(),
            site_id: self.site_id.unwrap_or_else(|| DEFAULT_SITE_ID.to_string()),
            shared_documents_name: self
                .shared_documents_name
                .unwrap_or_else(|| DEFAULT_SHARED_DOCUMENTS.to_string()),
            upload: self.upload.unwrap_or_default(),
            token_refresh_buffer: self.token_refresh_buffer.unwrap_or(Duration::from_secs(10)),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
        };

        config.validate()?;

        Ok(config)
    }
}
