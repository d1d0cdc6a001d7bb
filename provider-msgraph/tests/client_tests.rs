//! End-to-end tests through `GraphClient` with credential refresh

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{config, page, ScriptedHttp, GRAPH};
use core_auth::{Credential, CredentialRecord, OAuthConfig, RefreshMeans, TokenManager};
use futures::TryStreamExt;
use provider_msgraph::{Entry, GraphClient, TransferError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const TOKEN_URL: &str = "http://login.test/tenant/oauth2/v2.0/token";

fn token_response(access_token: &str) -> String {
    format!(
        r#"{{"access_token": "{access_token}", "token_type": "Bearer", "expires_in": 3600, "refresh_token": "rt-2"}}"#
    )
}

fn expired_refreshable() -> Credential {
    Credential::new("stale", Some(Utc::now() - ChronoDuration::minutes(5))).with_refresh(RefreshMeans {
        config: OAuthConfig {
            client_id: "client".to_string(),
            client_secret: None,
            redirect_uri: None,
            scopes: vec!["offline_access".to_string()],
            auth_url: "http://login.test/tenant/oauth2/v2.0/authorize".to_string(),
            token_url: TOKEN_URL.to_string(),
        },
        refresh_token: Some("rt-1".to_string()),
    })
}

#[tokio::test]
async fn test_expired_credential_is_refreshed_before_graph_call() {
    let http = Arc::new(
        ScriptedHttp::new()
            .respond(200, token_response("fresh"))
            .respond(200, page(&["1"], "dir", None)),
    );
    let tokens = Arc::new(TokenManager::new(expired_refreshable(), http.clone()));
    let client = GraphClient::new(config(), http.clone(), tokens.clone());

    let entries: Vec<Entry> = client
        .lister()
        .list(
            CancellationToken::new(),
            format!("{GRAPH}/v1.0/sites/root/lists/lib/items"),
            provider_msgraph::AcceptAll,
        )
        .try_collect()
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);

    let requests = http.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url, TOKEN_URL);
    assert_eq!(requests[1].header_value("Authorization"), Some("Bearer fresh"));

    let record = tokens.to_record().await;
    assert_eq!(record.token.refresh_token.as_deref(), Some("rt-2"));
}

#[tokio::test]
async fn test_restored_record_without_config_stops_at_expiry() {
    let record = CredentialRecord::from_json(
        r#"{"OAuth": {"access_token": "old", "token_type": "Bearer", "refresh_token": "rt", "expiry": "2020-01-01T00:00:00Z"}}"#,
    )
    .unwrap();

    let http = Arc::new(ScriptedHttp::new());
    let tokens = Arc::new(TokenManager::from_record(record, http.clone()).unwrap());
    let client = GraphClient::new(config(), http.clone(), tokens);

    let result = client
        .downloads()
        .download_item(&CancellationToken::new(), "item")
        .await;

    assert!(matches!(
        result,
        Err(TransferError::Auth(core_auth::AuthError::NoRefreshCapability))
    ));
    assert_eq!(http.request_count(), 0);
}

#[tokio::test]
async fn test_restored_record_refreshes_through_stored_endpoint() {
    let record = CredentialRecord::from_json(&format!(
        r#"{{
            "OAuth": {{"access_token": "old", "token_type": "Bearer", "refresh_token": "rt", "expiry": "2020-01-01T00:00:00Z"}},
            "OAuthConfig": {{
                "ClientID": "client",
                "ClientSecret": "",
                "Endpoint": {{"AuthURL": "http://login.test/authorize", "TokenURL": "{TOKEN_URL}", "AuthStyle": 0}},
                "RedirectURL": "",
                "Scopes": ["Files.ReadWrite.All"]
            }}
        }}"#
    ))
    .unwrap();

    let http = Arc::new(
        ScriptedHttp::new()
            .respond(200, token_response("renewed"))
            .respond(200, "file-content"),
    );
    let tokens = Arc::new(TokenManager::from_record(record, http.clone()).unwrap());
    let client = GraphClient::new(config(), http.clone(), tokens);

    let body = client
        .downloads()
        .download_item(&CancellationToken::new(), "item")
        .await
        .unwrap();

    assert_eq!(&body[..], b"file-content");
    let requests = http.requests();
    assert_eq!(requests[0].url, TOKEN_URL);
    assert_eq!(
        requests[1].url,
        format!("{GRAPH}/v1.0/sites/root/drive/items/item/content")
    );
    assert_eq!(requests[1].header_value("Authorization"), Some("Bearer renewed"));
}

#[tokio::test]
async fn test_mailbox_through_client() {
    let http = Arc::new(
        ScriptedHttp::new()
            .respond(200, r#"{"value": [{"id": "m1"}]}"#)
            .respond(200, r#"{"id": "m1", "subject": "Quarterly report"}"#),
    );
    let tokens = Arc::new(TokenManager::new(Credential::new("t", None), http.clone()));
    let client = GraphClient::new(config(), http.clone(), tokens);

    let messages = client
        .mailbox()
        .messages(&CancellationToken::new(), 1, &["id"])
        .await
        .unwrap();

    assert_eq!(messages[0].subject.as_deref(), Some("Quarterly report"));
    assert_eq!(
        http.requests()[0].url,
        format!("{GRAPH}/v1.0/me/messages?$top=1&$select=id")
    );
}
