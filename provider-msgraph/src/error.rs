//! Error types for the Microsoft Graph provider

use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

/// Failure of a single Graph request.
#[derive(Error, Debug)]
pub enum TransferError {
    /// No valid credential could be obtained
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Transport-level failure (connect, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response without a decodable error envelope
    #[error("Graph API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Error envelope with a non-empty code, regardless of HTTP status
    #[error("Graph API error {code} (status {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// Success response whose body did not decode
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// A lookup by name found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl TransferError {
    /// Whether retrying the identical request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Network(_) => true,
            TransferError::Status { status, .. } | TransferError::Api { status, .. } => {
                *status == 429 || *status >= 500
            }
            _ => false,
        }
    }
}

impl From<BridgeError> for TransferError {
    fn from(error: BridgeError) -> Self {
        TransferError::Network(error.to_string())
    }
}

/// A listing walk aborted on the page at `url`.
#[derive(Error, Debug)]
#[error("Listing failed at {url}: {source}")]
pub struct ListError {
    pub url: String,
    #[source]
    pub source: TransferError,
}

/// Upload failures.
#[derive(Error, Debug)]
pub enum UploadError {
    /// No MIME type is known for the file name's extension
    #[error("Unsupported file extension for '{0}'")]
    UnsupportedExtension(String),

    #[error("Failed to create upload session: {0}")]
    SessionCreationFailed(#[source] TransferError),

    /// The chunk starting at `offset` failed every attempt
    #[error("Chunk at offset {offset} failed: {cause}")]
    ChunkCommitFailed {
        offset: u64,
        #[source]
        cause: TransferError,
    },

    #[error("Failed to decode upload response: {0}")]
    ResponseDecodeFailed(String),

    /// Session state cannot be committed (already complete, zero length)
    #[error("Invalid upload session: {0}")]
    InvalidSession(String),

    /// Direct upload request failure
    #[error(transparent)]
    Transfer(TransferError),

    #[error("Failed to read upload content: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload cancelled")]
    Cancelled,
}

impl From<TransferError> for UploadError {
    fn from(error: TransferError) -> Self {
        match error {
            TransferError::Cancelled => UploadError::Cancelled,
            other => UploadError::Transfer(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
