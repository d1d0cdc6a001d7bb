//! # Power BI Provider
//!
//! Triggers dataset refreshes through the Power BI REST API with an
//! app-only credential.

pub mod error;
pub mod service;

pub use error::{PowerBiError, Result};
pub use service::{DatasetRefresh, PowerBiService, POWERBI_SCOPE};
