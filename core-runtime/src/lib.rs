//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the transfer client:
//! - Logging and tracing infrastructure
//! - Client configuration (credentials, endpoints, upload sizing)
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the auth and provider
//! crates depend on. Endpoints and thresholds live here so they are injected
//! at construction rather than read from process-wide globals.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ClientConfig, ClientConfigBuilder, Endpoints, UploadConfig};
pub use error::{Error, Result};
