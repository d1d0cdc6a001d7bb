//! Whole-file downloads.

use bytes::Bytes;
use core_runtime::config::ClientConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::Result;
use crate::transfer::TransferClient;

pub struct Downloader {
    transfer: Arc<TransferClient>,
    graph_v1: String,
    site_id: String,
}

impl Downloader {
    pub fn new(config: &ClientConfig, transfer: Arc<TransferClient>) -> Self {
        Self {
            transfer,
            graph_v1: config.endpoints.graph_v1(),
            site_id: config.site_id.clone(),
        }
    }

    /// Content URL of a drive item in the configured site
    pub fn download_url(&self, item_id: &str) -> String {
        format!(
            "{}/sites/{}/drive/items/{}/content",
            self.graph_v1,
            urlencoding::encode(&self.site_id),
            urlencoding::encode(item_id)
        )
    }

    /// One authenticated GET of `url`, buffered in memory. Not retried.
    #[instrument(skip(self, cancel))]
    pub async fn download(&self, cancel: &CancellationToken, url: &str) -> Result<Bytes> {
        self.transfer.get_bytes(cancel, url).await
    }

    pub async fn download_item(&self, cancel: &CancellationToken, item_id: &str) -> Result<Bytes> {
        let url = self.download_url(item_id);
        self.download(cancel, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferError;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use core_auth::{Credential, TokenManager};
    use core_runtime::config::Endpoints;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn download_stream(&self, url: String) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
        }
    }

    fn downloader(http: MockHttpClient) -> Downloader {
        let config = ClientConfig::builder()
            .tenant_id("tenant")
            .client_id("client")
            .site_id("contoso.sharepoint.com,1,2")
            .endpoints(Endpoints {
                graph_host: "http://127.0.0.1:9000".to_string(),
                ..Endpoints::default()
            })
            .build()
            .unwrap();
        let tokens = TokenManager::new(Credential::new("abc", None), Arc::new(MockHttpClient::new()));
        Downloader::new(&config, Arc::new(TransferClient::new(Arc::new(http), Arc::new(tokens))))
    }

    #[test]
    fn test_download_url() {
        let downloader = downloader(MockHttpClient::new());
        assert_eq!(
            downloader.download_url("01ABC"),
            "http://127.0.0.1:9000/v1.0/sites/contoso.sharepoint.com%2C1%2C2/drive/items/01ABC/content"
        );
    }

    #[tokio::test]
    async fn test_download_item_returns_body() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|request| {
            assert!(request.url.ends_with("/drive/items/01ABC/content"));
            assert!(request.header_value("Authorization").is_some());
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(&[1, 2, 3]),
            })
        });

        let data = downloader(http)
            .download_item(&CancellationToken::new(), "01ABC")
            .await
            .unwrap();

        assert_eq!(&data[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_download_is_not_retried() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout("30s".to_string())));

        let result = downloader(http)
            .download(&CancellationToken::new(), "http://127.0.0.1:9000/file")
            .await;

        assert!(matches!(result, Err(TransferError::Network(_))));
    }
}
