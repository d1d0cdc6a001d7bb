//! Paginated collection walks.
//!
//! Graph collections come back one page at a time with an
//! `@odata.nextLink` pointing at the next page. [`PaginatedLister::list`]
//! turns such a collection into a stream of entries, following links until
//! a page arrives without one.

use core_runtime::logging::redact_url;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ListError;
use crate::transfer::TransferClient;
use crate::types::{Entry, ListPage};

/// Client-side predicate over listed entries
pub trait EntryFilter: Send + Sync {
    fn accept(&self, entry: &Entry) -> bool;
}

impl<F> EntryFilter for F
where
    F: Fn(&Entry) -> bool + Send + Sync,
{
    fn accept(&self, entry: &Entry) -> bool {
        self(entry)
    }
}

/// Keeps entries whose parent reference id equals `parent_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentFilter {
    parent_id: String,
}

impl ParentFilter {
    pub fn new(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
        }
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }
}

impl EntryFilter for ParentFilter {
    fn accept(&self, entry: &Entry) -> bool {
        entry.parent_id() == self.parent_id
    }
}

/// Keeps every entry
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl EntryFilter for AcceptAll {
    fn accept(&self, _entry: &Entry) -> bool {
        true
    }
}

pub struct PaginatedLister {
    transfer: Arc<TransferClient>,
}

impl PaginatedLister {
    pub fn new(transfer: Arc<TransferClient>) -> Self {
        Self { transfer }
    }

    /// Stream the accepted entries of the collection at `collection_url`.
    ///
    /// Pages are fetched lazily as the stream is polled, strictly one after
    /// another. A page with no accepted entries does not end the walk. The
    /// first failing page ends the stream with a [`ListError`] naming its
    /// URL; entries yielded before it stand.
    pub fn list<F>(
        &self,
        cancel: CancellationToken,
        collection_url: impl Into<String>,
        filter: F,
    ) -> BoxStream<'static, Result<Entry, ListError>>
    where
        F: EntryFilter + 'static,
    {
        let transfer = self.transfer.clone();
        let filter: Arc<dyn EntryFilter> = Arc::new(filter);

        stream::try_unfold(Some(collection_url.into()), move |cursor| {
            let transfer = transfer.clone();
            let filter = filter.clone();
            let cancel = cancel.clone();

            async move {
                let Some(url) = cursor else {
                    return Ok(None);
                };

                let page: ListPage = transfer
                    .get_json(&cancel, &url)
                    .await
                    .map_err(|source| ListError {
                        url: url.clone(),
                        source,
                    })?;

                let next = page.next_cursor().map(str::to_string);
                let fetched = page.value.len();
                let accepted: Vec<Entry> = page
                    .value
                    .into_iter()
                    .filter(|entry| filter.accept(entry))
                    .collect();

                debug!(
                    url = %redact_url(&url),
                    fetched,
                    accepted = accepted.len(),
                    has_next = next.is_some(),
                    "Fetched collection page"
                );

                Ok::<_, ListError>(Some((accepted, next)))
            }
        })
        .map_ok(|entries| stream::iter(entries.into_iter().map(Ok::<Entry, ListError>)))
        .try_flatten()
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferError;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bytes::Bytes;
    use core_auth::{Credential, TokenManager};
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

    fn lister(http: MockHttpClient) -> PaginatedLister {
        let tokens = TokenManager::new(Credential::new("abc", None), Arc::new(MockHttpClient::new()));
        PaginatedLister::new(Arc::new(TransferClient::new(Arc::new(http), Arc::new(tokens))))
    }

    fn ok(body: String) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body),
        })
    }

    fn entry(id: &str, parent: &str) -> Entry {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("{id}.txt"),
            "parentReference": {"id": parent}
        }))
        .unwrap()
    }

    #[test]
    fn test_parent_filter() {
        let filter = ParentFilter::new("dir-1");
        assert!(filter.accept(&entry("a", "dir-1")));
        assert!(!filter.accept(&entry("b", "dir-2")));
    }

    #[test]
    fn test_closure_filter() {
        let filter = |e: &Entry| e.name.starts_with('a');
        assert!(filter.accept(&entry("a", "x")));
        assert!(!EntryFilter::accept(&filter, &entry("b", "x")));
    }

    #[tokio::test]
    async fn test_single_page_without_next_link() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|request| {
            assert_eq!(request.url, "https://graph.example/items");
            ok(r#"{"value": [{"id": "1", "name": "a"}, {"id": "2", "name": "b"}]}"#.to_string())
        });

        let entries: Vec<Entry> = lister(http)
            .list(CancellationToken::new(), "https://graph.example/items", AcceptAll)
            .try_collect()
            .await
            .unwrap();

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_empty_next_link_ends_walk() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| ok(r#"{"value": [], "@odata.nextLink": ""}"#.to_string()));

        let entries: Vec<Entry> = lister(http)
            .list(CancellationToken::new(), "https://graph.example/items", AcceptAll)
            .try_collect()
            .await
            .unwrap();

        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_decode_failure_names_page_url() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| ok("not json".to_string()));

        let result: Result<Vec<Entry>, ListError> = lister(http)
            .list(CancellationToken::new(), "https://graph.example/broken", AcceptAll)
            .try_collect()
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.url, "https://graph.example/broken");
        assert!(matches!(error.source, TransferError::Decode(_)));
    }
}
