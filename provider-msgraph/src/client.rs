//! Entry point tying configuration, credentials and transport together.

use bridge_traits::http::HttpClient;
use core_auth::TokenManager;
use core_runtime::config::ClientConfig;
use std::sync::Arc;

use crate::download::Downloader;
use crate::lister::PaginatedLister;
use crate::mailbox::Mailbox;
use crate::sharepoint::SharePoint;
use crate::transfer::TransferClient;
use crate::upload::UploadEngine;

/// Microsoft Graph client for one tenant and credential.
///
/// Services handed out share the same [`TransferClient`] and therefore the
/// same [`TokenManager`].
#[derive(Clone)]
pub struct GraphClient {
    config: ClientConfig,
    transfer: Arc<TransferClient>,
}

impl GraphClient {
    pub fn new(config: ClientConfig, http: Arc<dyn HttpClient>, tokens: Arc<TokenManager>) -> Self {
        let transfer = TransferClient::new(http, tokens).with_request_timeout(config.request_timeout);
        Self {
            config,
            transfer: Arc::new(transfer),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transfer(&self) -> &Arc<TransferClient> {
        &self.transfer
    }

    pub fn lister(&self) -> PaginatedLister {
        PaginatedLister::new(self.transfer.clone())
    }

    pub fn uploads(&self) -> UploadEngine {
        UploadEngine::new(&self.config, self.transfer.clone())
    }

    pub fn downloads(&self) -> Downloader {
        Downloader::new(&self.config, self.transfer.clone())
    }

    pub fn sharepoint(&self) -> SharePoint {
        SharePoint::new(&self.config, self.transfer.clone())
    }

    pub fn mailbox(&self) -> Mailbox {
        Mailbox::new(&self.config, self.transfer.clone())
    }
}
