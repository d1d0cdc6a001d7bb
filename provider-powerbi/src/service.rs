//! Power BI dataset operations.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use core_auth::{AuthenticatedClient, TokenManager};
use core_runtime::config::ClientConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::{PowerBiError, Result};

/// Resource scope for app-only Power BI tokens
pub const POWERBI_SCOPE: &str = "https://analysis.windows.net/powerbi/api/.default";

/// Accepted refresh request.
#[derive(Debug, Clone)]
pub struct DatasetRefresh {
    /// 200 or 202
    pub status: u16,
    /// `RequestId` response header, when present
    pub request_id: Option<String>,
    pub body: Bytes,
}

pub struct PowerBiService {
    http: Arc<dyn HttpClient>,
    tokens: Arc<TokenManager>,
    myorg_url: String,
}

impl PowerBiService {
    /// Service with its own app-only credential for [`POWERBI_SCOPE`].
    ///
    /// The configuration must carry a client secret; the first call acquires
    /// the token through the `client_credentials` grant.
    pub fn new(config: &ClientConfig, http: Arc<dyn HttpClient>) -> Self {
        let tokens = TokenManager::app_only_with_scopes(
            config,
            vec![POWERBI_SCOPE.to_string()],
            http.clone(),
        );
        Self::with_tokens(config, http, Arc::new(tokens))
    }

    pub fn with_tokens(config: &ClientConfig, http: Arc<dyn HttpClient>, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            tokens,
            myorg_url: config.endpoints.powerbi_myorg(),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Queue a refresh of `dataset_id` in workspace `group_id`.
    #[instrument(skip(self, cancel))]
    pub async fn refresh_dataset_in_group(
        &self,
        cancel: &CancellationToken,
        group_id: &str,
        dataset_id: &str,
    ) -> Result<DatasetRefresh> {
        let url = format!(
            "{}/groups/{}/datasets/{}/refreshes",
            self.myorg_url,
            urlencoding::encode(group_id),
            urlencoding::encode(dataset_id)
        );
        self.post_refresh(cancel, url).await
    }

    /// Queue a refresh of `dataset_id` in "My workspace".
    #[instrument(skip(self, cancel))]
    pub async fn refresh_dataset(&self, cancel: &CancellationToken, dataset_id: &str) -> Result<DatasetRefresh> {
        let url = format!(
            "{}/datasets/{}/refreshes",
            self.myorg_url,
            urlencoding::encode(dataset_id)
        );
        self.post_refresh(cancel, url).await
    }

    async fn post_refresh(&self, cancel: &CancellationToken, url: String) -> Result<DatasetRefresh> {
        if cancel.is_cancelled() {
            return Err(PowerBiError::Cancelled);
        }

        let client = AuthenticatedClient::new(self.http.clone(), self.tokens.clone())
            .with_cancellation(cancel.clone());
        let request = HttpRequest::new(HttpMethod::Post, url)
            .header("Content-Type", "application/json")
            .header("Content-Length", "0");

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(PowerBiError::Cancelled),
            result = client.execute(request) => match result {
                Ok(response) => response,
                Err(_) if cancel.is_cancelled() => return Err(PowerBiError::Cancelled),
                Err(e) => return Err(e.into()),
            },
        };

        if response.status != 200 && response.status != 202 {
            let body = String::from_utf8_lossy(&response.body).into_owned();
            warn!(status = response.status, "Dataset refresh rejected");
            return Err(PowerBiError::Status {
                status: response.status,
                body,
            });
        }

        let request_id = response.header("RequestId").map(str::to_string);
        info!(status = response.status, request_id = ?request_id, "Dataset refresh queued");

        Ok(DatasetRefresh {
            status: response.status,
            request_id,
            body: response.body,
        })
    }
}
