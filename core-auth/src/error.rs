use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The held credential expired and carries no way to obtain a new one.
    #[error("Credential expired and no refresh capability is configured")]
    NoRefreshCapability,

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("OAuth state mismatch: expected {expected}, got {actual}")]
    StateMismatch { expected: String, actual: String },

    #[error("Invalid authorization code: {0}")]
    InvalidAuthCode(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid credential record: {0}")]
    InvalidRecord(String),

    #[error("Invalid OAuth configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Whether retrying the same operation later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::NetworkError(_))
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
