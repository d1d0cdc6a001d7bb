//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http_client = Arc::new(
//!         ReqwestHttpClient::new()?.with_connectivity_url(config.endpoints.graph_host.clone()),
//!     );
//!     // Hand the client to the token manager and the SharePoint client
//!     Ok(())
//! }
//! ```

mod http;

pub use http::ReqwestHttpClient;
