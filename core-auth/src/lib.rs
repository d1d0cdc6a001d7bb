//! # Authentication Module
//!
//! OAuth 2.0 credentials for the Microsoft identity platform.
//!
//! ## Overview
//!
//! - [`OAuthFlowManager`]: authorization-code (PKCE), refresh-token and
//!   client-credentials grants against a tenant's v2 token endpoint
//! - [`TokenManager`]: holds one [`Credential`] and keeps it valid, with a
//!   single refresh in flight no matter how many callers ask
//! - [`AuthenticatedClient`]: an `HttpClient` that signs every request
//! - [`CredentialRecord`]: persisted token file format

pub mod error;
pub mod manager;
pub mod oauth;
pub mod transport;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::{TokenManager, DEFAULT_REFRESH_BUFFER};
pub use oauth::{OAuthFlowManager, PkceVerifier};
pub use transport::AuthenticatedClient;
pub use types::{
    Credential, CredentialRecord, OAuthConfig, RefreshMeans, StoredEndpoint, StoredOAuthConfig,
    TokenRecord,
};
