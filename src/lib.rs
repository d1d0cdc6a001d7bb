//! Microsoft Graph transfer client.
//!
//! This crate re-exports the workspace crates behind one dependency so hosts
//! can depend on `msclient` and enable the documented features without wiring
//! each crate individually:
//!
//! - `desktop-shims` (default): reqwest-backed [`HttpClient`](bridge_traits::HttpClient)
//! - `powerbi`: Power BI dataset refresh trigger

pub use bridge_traits;
pub use core_auth;
pub use core_runtime;
pub use provider_msgraph;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

#[cfg(feature = "powerbi")]
pub use provider_powerbi;
