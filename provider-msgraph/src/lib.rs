//! # Microsoft Graph Provider
//!
//! Drive, SharePoint and Outlook access over Microsoft Graph v1.0.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`TransferClient`]: signed requests with cancellation and error
//!   envelope detection
//! - [`PaginatedLister`]: `@odata.nextLink` walks as a stream of entries
//! - [`UploadEngine`]: direct PUT for small files, resumable upload sessions
//!   with per-chunk retry for large ones
//! - [`SharePoint`] and [`Mailbox`] services built on the above

pub mod client;
pub mod download;
pub mod error;
pub mod lister;
pub mod mailbox;
pub mod mime;
pub mod sharepoint;
pub mod transfer;
pub mod types;
pub mod upload;

pub use client::GraphClient;
pub use download::Downloader;
pub use error::{ListError, Result, TransferError, UploadError};
pub use lister::{AcceptAll, EntryFilter, PaginatedLister, ParentFilter};
pub use mailbox::Mailbox;
pub use mime::mime_for;
pub use sharepoint::SharePoint;
pub use transfer::{TransferClient, DEFAULT_REQUEST_TIMEOUT};
pub use types::{Entry, ListPage, Message};
pub use upload::{UploadEngine, UploadSession};
