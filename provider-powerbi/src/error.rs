//! Error types for the Power BI provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PowerBiError {
    /// Transport failure, or no app-only token could be obtained
    #[error("Power BI request failed: {0}")]
    Request(#[from] BridgeError),

    /// Any status other than 200 or 202
    #[error("Power BI returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Power BI request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PowerBiError>;
