//! Integration tests for paginated listing
//!
//! - next-link traversal order and termination
//! - client-side filtering across pages
//! - mid-walk failures and cancellation

mod common;

use common::{page, transfer, ScriptedHttp, GRAPH};
use futures::StreamExt;
use futures::TryStreamExt;
use provider_msgraph::{AcceptAll, Entry, ListError, PaginatedLister, ParentFilter, TransferError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn url(path: &str) -> String {
    format!("{GRAPH}/v1.0/{path}")
}

#[tokio::test]
async fn test_three_pages_in_order_without_extra_request() {
    let http = Arc::new(
        ScriptedHttp::new()
            .respond(200, page(&["1", "2"], "dir", Some(&url("items?page=2"))))
            .respond(200, page(&["3"], "dir", Some(&url("items?page=3"))))
            .respond(200, page(&["4", "5"], "dir", None)),
    );
    let lister = PaginatedLister::new(transfer(http.clone()));

    let entries: Vec<Entry> = lister
        .list(CancellationToken::new(), url("items"), AcceptAll)
        .try_collect()
        .await
        .unwrap();

    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

    let urls: Vec<String> = http.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![url("items"), url("items?page=2"), url("items?page=3")]
    );
}

#[tokio::test]
async fn test_fully_filtered_page_does_not_stop_walk() {
    let http = Arc::new(
        ScriptedHttp::new()
            .respond(200, page(&["a"], "target", Some(&url("items?page=2"))))
            .respond(200, page(&["x", "y"], "other", Some(&url("items?page=3"))))
            .respond(200, page(&["b"], "target", None)),
    );
    let lister = PaginatedLister::new(transfer(http.clone()));

    let entries: Vec<Entry> = lister
        .list(CancellationToken::new(), url("items"), ParentFilter::new("target"))
        .try_collect()
        .await
        .unwrap();

    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(http.request_count(), 3);
}

#[tokio::test]
async fn test_pages_are_fetched_lazily() {
    let http = Arc::new(
        ScriptedHttp::new()
            .respond(200, page(&["1"], "dir", Some(&url("items?page=2"))))
            .respond(200, page(&["2"], "dir", None)),
    );
    let lister = PaginatedLister::new(transfer(http.clone()));

    let mut stream = lister.list(CancellationToken::new(), url("items"), AcceptAll);
    assert_eq!(http.request_count(), 0);

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.id, "1");
    assert_eq!(http.request_count(), 1);
}

#[tokio::test]
async fn test_failure_keeps_earlier_entries_and_names_url() {
    let http = Arc::new(
        ScriptedHttp::new()
            .respond(200, page(&["1", "2"], "dir", Some(&url("items?page=2"))))
            .respond(
                503,
                r#"{"error": {"code": "serviceNotAvailable", "message": "try later"}}"#,
            ),
    );
    let lister = PaginatedLister::new(transfer(http.clone()));

    let results: Vec<Result<Entry, ListError>> = lister
        .list(CancellationToken::new(), url("items"), AcceptAll)
        .collect()
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().id, "1");
    assert_eq!(results[1].as_ref().unwrap().id, "2");

    let error = results[2].as_ref().unwrap_err();
    assert_eq!(error.url, url("items?page=2"));
    assert!(matches!(
        error.source,
        TransferError::Api { status: 503, ref code, .. } if code == "serviceNotAvailable"
    ));
}

#[tokio::test]
async fn test_error_envelope_on_success_aborts_walk() {
    let http = Arc::new(ScriptedHttp::new().respond(
        200,
        r#"{"error": {"code": "accessDenied", "message": "denied"}, "value": []}"#,
    ));
    let lister = PaginatedLister::new(transfer(http));

    let result: Result<Vec<Entry>, ListError> = lister
        .list(CancellationToken::new(), url("items"), AcceptAll)
        .try_collect()
        .await;

    assert!(matches!(
        result.unwrap_err().source,
        TransferError::Api { status: 200, .. }
    ));
}

#[tokio::test]
async fn test_cancellation_during_page_fetch() {
    let cancel = CancellationToken::new();
    let http = Arc::new(
        ScriptedHttp::new()
            .respond(200, page(&["1"], "dir", Some(&url("items?page=2"))))
            .cancel_and_hang(cancel.clone()),
    );
    let lister = PaginatedLister::new(transfer(http.clone()));

    let results: Vec<Result<Entry, ListError>> =
        lister.list(cancel, url("items"), AcceptAll).collect().await;

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1].as_ref().unwrap_err().source,
        TransferError::Cancelled
    ));
    assert_eq!(http.request_count(), 2);
}

#[tokio::test]
async fn test_each_list_call_starts_fresh() {
    let http = Arc::new(
        ScriptedHttp::new()
            .respond(200, page(&["1"], "dir", None))
            .respond(200, page(&["1"], "dir", None)),
    );
    let lister = PaginatedLister::new(transfer(http.clone()));

    for _ in 0..2 {
        let entries: Vec<Entry> = lister
            .list(CancellationToken::new(), url("items"), AcceptAll)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    let urls: Vec<String> = http.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec![url("items"), url("items")]);
}
