//! SharePoint document library access for one site.

use bytes::Bytes;
use core_runtime::config::ClientConfig;
use futures::stream::{BoxStream, TryStreamExt};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::download::Downloader;
use crate::error::{ListError, Result, TransferError, UploadError};
use crate::lister::{EntryFilter, PaginatedLister, ParentFilter};
use crate::transfer::TransferClient;
use crate::types::Entry;
use crate::upload::{UploadEngine, UploadSession};

/// A site's document library: listing, uploads and downloads.
///
/// # Example
///
/// ```ignore
/// let sharepoint = SharePoint::new(&config, transfer);
/// let children: Vec<Entry> = sharepoint
///     .list_children(&cancel, &folder_id)
///     .await?
///     .try_collect()
///     .await?;
/// ```
pub struct SharePoint {
    lister: PaginatedLister,
    uploads: UploadEngine,
    downloads: Downloader,
    graph_v1: String,
    site_id: String,
    shared_documents_name: String,
}

impl SharePoint {
    pub fn new(config: &ClientConfig, transfer: Arc<TransferClient>) -> Self {
        Self {
            lister: PaginatedLister::new(transfer.clone()),
            uploads: UploadEngine::new(config, transfer.clone()),
            downloads: Downloader::new(config, transfer),
            graph_v1: config.endpoints.graph_v1(),
            site_id: config.site_id.clone(),
            shared_documents_name: config.shared_documents_name.clone(),
        }
    }

    fn site_url(&self) -> String {
        format!("{}/sites/{}", self.graph_v1, urlencoding::encode(&self.site_id))
    }

    /// Id of the site list named like the configured shared documents library.
    ///
    /// The walk stops at the first match.
    #[instrument(skip(self, cancel))]
    pub async fn shared_documents_id(&self, cancel: &CancellationToken) -> std::result::Result<String, ListError> {
        let url = format!("{}/lists", self.site_url());
        let name = self.shared_documents_name.clone();

        let mut lists = self
            .lister
            .list(cancel.clone(), url.clone(), move |entry: &Entry| entry.name == name);

        match lists.try_next().await? {
            Some(list) => {
                debug!(id = %list.id, "Found shared documents list");
                Ok(list.id)
            }
            None => Err(ListError {
                url,
                source: TransferError::NotFound(format!(
                    "no list named '{}'",
                    self.shared_documents_name
                )),
            }),
        }
    }

    /// Walk an arbitrary collection URL
    pub fn list<F>(
        &self,
        cancel: &CancellationToken,
        collection_url: impl Into<String>,
        filter: F,
    ) -> BoxStream<'static, std::result::Result<Entry, ListError>>
    where
        F: EntryFilter + 'static,
    {
        self.lister.list(cancel.clone(), collection_url, filter)
    }

    /// Items of the shared documents library whose parent is `folder_id`
    #[instrument(skip(self, cancel))]
    pub async fn list_children(
        &self,
        cancel: &CancellationToken,
        folder_id: &str,
    ) -> std::result::Result<BoxStream<'static, std::result::Result<Entry, ListError>>, ListError> {
        let library_id = self.shared_documents_id(cancel).await?;
        let url = format!(
            "{}/lists/{}/items",
            self.site_url(),
            urlencoding::encode(&library_id)
        );
        Ok(self
            .lister
            .list(cancel.clone(), url, ParentFilter::new(folder_id)))
    }

    pub async fn upload<R>(
        &self,
        cancel: &CancellationToken,
        folder_id: &str,
        file_name: &str,
        file_size: u64,
        content: R,
    ) -> std::result::Result<Entry, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.uploads
            .upload(cancel, folder_id, file_name, file_size, content)
            .await
    }

    pub async fn create_session(
        &self,
        cancel: &CancellationToken,
        folder_id: &str,
        file_name: &str,
        file_size: u64,
    ) -> std::result::Result<UploadSession, UploadError> {
        self.uploads
            .create_session(cancel, folder_id, file_name, file_size)
            .await
    }

    pub async fn commit_session<R>(
        &self,
        cancel: &CancellationToken,
        session: &mut UploadSession,
        content: &mut R,
    ) -> std::result::Result<Entry, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.uploads.commit_session(cancel, session, content).await
    }

    pub async fn download(&self, cancel: &CancellationToken, url: &str) -> Result<Bytes> {
        self.downloads.download(cancel, url).await
    }

    pub fn download_url(&self, item_id: &str) -> String {
        self.downloads.download_url(item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use core_auth::{Credential, TokenManager};
    use mockall::mock;
    use mockall::Sequence;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn download_stream(&self, url: String) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
        }
    }

    fn sharepoint(http: MockHttpClient) -> SharePoint {
        let config = ClientConfig::builder()
            .tenant_id("tenant")
            .client_id("client")
            .build()
            .unwrap();
        let tokens = TokenManager::new(Credential::new("abc", None), Arc::new(MockHttpClient::new()));
        SharePoint::new(&config, Arc::new(TransferClient::new(Arc::new(http), Arc::new(tokens))))
    }

    fn ok(body: &str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    #[tokio::test]
    async fn test_shared_documents_id_found_on_second_page() {
        let mut http = MockHttpClient::new();
        let mut seq = Sequence::new();

        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request| {
                assert_eq!(request.url, "https://graph.microsoft.com/v1.0/sites/root/lists");
                ok(r#"{"value": [{"id": "l-1", "name": "Site Pages"}], "@odata.nextLink": "https://graph.microsoft.com/v1.0/sites/root/lists?$skiptoken=2"}"#)
            });
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                ok(r#"{"value": [{"id": "l-2", "name": "Shared Documents"}], "@odata.nextLink": "https://graph.microsoft.com/v1.0/sites/root/lists?$skiptoken=3"}"#)
            });

        let id = sharepoint(http)
            .shared_documents_id(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(id, "l-2");
    }

    #[tokio::test]
    async fn test_missing_shared_documents_is_not_found() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| ok(r#"{"value": [{"id": "l-1", "name": "Site Pages"}]}"#));

        let error = sharepoint(http)
            .shared_documents_id(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error.source, TransferError::NotFound(_)));
        assert!(error.url.ends_with("/sites/root/lists"));
    }

    #[tokio::test]
    async fn test_list_children_filters_by_parent() {
        let mut http = MockHttpClient::new();
        let mut seq = Sequence::new();

        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ok(r#"{"value": [{"id": "lib", "name": "Shared Documents"}]}"#));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request| {
                assert_eq!(
                    request.url,
                    "https://graph.microsoft.com/v1.0/sites/root/lists/lib/items"
                );
                ok(r#"{"value": [
                    {"id": "a", "parentReference": {"id": "dir-1"}},
                    {"id": "b", "parentReference": {"id": "dir-2"}},
                    {"id": "c", "parentReference": {"id": "dir-1"}}
                ]}"#)
            });

        let cancel = CancellationToken::new();
        let children: Vec<Entry> = sharepoint(http)
            .list_children(&cancel, "dir-1")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let ids: Vec<&str> = children.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_download_url_uses_site() {
        let sharepoint = sharepoint(MockHttpClient::new());
        assert_eq!(
            sharepoint.download_url("item"),
            "https://graph.microsoft.com/v1.0/sites/root/drive/items/item/content"
        );
    }
}
