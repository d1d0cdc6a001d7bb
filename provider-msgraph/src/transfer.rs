//! Authenticated request dispatch for Microsoft Graph.
//!
//! Every Graph call in this crate goes through [`TransferClient`], which
//! attaches the bearer credential, races the request against the caller's
//! cancellation token and turns error envelopes into typed errors.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bytes::Bytes;
use core_auth::{AuthError, TokenManager};
use core_runtime::logging::redact_url;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, TransferError};
use crate::types::ErrorEnvelope;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body excerpt kept in [`TransferError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Graph request executor shared by the lister, upload engine and services.
pub struct TransferClient {
    http: Arc<dyn HttpClient>,
    tokens: Arc<TokenManager>,
    request_timeout: Duration,
}

impl TransferClient {
    pub fn new(http: Arc<dyn HttpClient>, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            tokens,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Timeout applied to requests that do not carry their own
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Send a signed request and check the response for errors.
    ///
    /// A body carrying `{"error": {"code": ...}}` with a non-empty code fails
    /// with [`TransferError::Api`] even when the status is 2xx.
    #[instrument(skip(self, cancel, request), fields(method = %request.method, url = %redact_url(&request.url)))]
    pub async fn send(&self, cancel: &CancellationToken, request: HttpRequest) -> Result<HttpResponse> {
        let request = self.sign(cancel, request).await?;
        let response = self.dispatch(cancel, request, None).await?;
        check_envelope(response)
    }

    /// Send without a bearer header, for pre-authenticated URLs.
    ///
    /// The request is attempted once; the caller owns retry.
    #[instrument(skip(self, cancel, request), fields(method = %request.method, url = %redact_url(&request.url)))]
    pub async fn send_unauthenticated(
        &self,
        cancel: &CancellationToken,
        request: HttpRequest,
    ) -> Result<HttpResponse> {
        let request = with_tracking_headers(request);
        let response = self
            .dispatch(cancel, request, Some(RetryPolicy::single_attempt()))
            .await?;
        check_envelope(response)
    }

    /// GET `url` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, cancel: &CancellationToken, url: &str) -> Result<T> {
        let response = self
            .send(cancel, HttpRequest::new(HttpMethod::Get, url))
            .await?;
        decode(&response)
    }

    /// GET `url` once and return the raw body.
    ///
    /// Only the status is checked; content that happens to look like an
    /// error envelope is returned as-is.
    #[instrument(skip(self, cancel), fields(url = %redact_url(url)))]
    pub async fn get_bytes(&self, cancel: &CancellationToken, url: &str) -> Result<Bytes> {
        let request = self
            .sign(cancel, HttpRequest::new(HttpMethod::Get, url))
            .await?;
        let response = self
            .dispatch(cancel, request, Some(RetryPolicy::single_attempt()))
            .await?;

        if !response.is_success() {
            return Err(failure_from(response));
        }
        debug!(bytes = response.body.len(), "Downloaded content");
        Ok(response.body)
    }

    async fn sign(&self, cancel: &CancellationToken, request: HttpRequest) -> Result<HttpRequest> {
        let (name, value) = self
            .tokens
            .authorization_header(cancel)
            .await
            .map_err(|e| match e {
                AuthError::Cancelled => TransferError::Cancelled,
                other => TransferError::Auth(other),
            })?;
        Ok(with_tracking_headers(request.header(name, value)))
    }

    async fn dispatch(
        &self,
        cancel: &CancellationToken,
        request: HttpRequest,
        policy: Option<RetryPolicy>,
    ) -> Result<HttpResponse> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let request = match request.timeout {
            Some(_) => request,
            None => request.timeout(self.request_timeout),
        };

        let call = async {
            match policy {
                Some(policy) => self.http.execute_with_retry(request, policy).await,
                None => self.http.execute(request).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Request cancelled in flight");
                Err(TransferError::Cancelled)
            }
            result = call => {
                let response = result.map_err(TransferError::from)?;
                debug!(status = response.status, "Graph response");
                Ok(response)
            }
        }
    }
}

fn with_tracking_headers(request: HttpRequest) -> HttpRequest {
    let request = request.header("client-request-id", Uuid::new_v4().to_string());
    if request.header_value("Accept").is_some() {
        request
    } else {
        request.header("Accept", "application/json")
    }
}

/// Decode a successful JSON body
pub(crate) fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| TransferError::Decode(e.to_string()))
}

fn api_error(status: u16, body: &[u8]) -> Option<TransferError> {
    let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    let error = envelope.into_error()?;
    Some(TransferError::Api {
        status,
        code: error.code,
        message: error.message,
        request_id: error.inner_error.and_then(|inner| inner.request_id),
    })
}

fn failure_from(response: HttpResponse) -> TransferError {
    if let Some(error) = api_error(response.status, &response.body) {
        warn!(status = response.status, error = %error, "Graph request failed");
        return error;
    }

    let mut body = String::from_utf8_lossy(&response.body).into_owned();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    warn!(status = response.status, "Graph request failed without error envelope");
    TransferError::Status {
        status: response.status,
        body,
    }
}

fn check_envelope(response: HttpResponse) -> Result<HttpResponse> {
    if !response.is_success() {
        return Err(failure_from(response));
    }
    if let Some(error) = api_error(response.status, &response.body) {
        warn!(status = response.status, error = %error, "Graph returned an error envelope");
        return Err(error);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use core_auth::Credential;
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

    fn response(status: u16, body: &'static str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn client(http: MockHttpClient, credential: Credential) -> TransferClient {
        let tokens = TokenManager::new(credential, Arc::new(MockHttpClient::new()));
        TransferClient::new(Arc::new(http), Arc::new(tokens))
    }

    #[tokio::test]
    async fn test_send_attaches_bearer_and_request_id() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|request| {
            assert_eq!(request.header_value("Authorization"), Some("Bearer abc"));
            assert!(request.header_value("client-request-id").is_some());
            assert_eq!(request.header_value("Accept"), Some("application/json"));
            assert_eq!(request.timeout, Some(DEFAULT_REQUEST_TIMEOUT));
            Ok(response(200, r#"{"id": "1"}"#))
        });

        let transfer = client(http, Credential::new("abc", None));
        let value: serde_json::Value = transfer
            .get_json(&CancellationToken::new(), "https://graph.example/v1.0/me")
            .await
            .unwrap();

        assert_eq!(value["id"], "1");
    }

    #[tokio::test]
    async fn test_error_envelope_on_200_is_api_error() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(response(
                200,
                r#"{"error": {"code": "accessDenied", "message": "Nope", "innerError": {"request-id": "r-1"}}}"#,
            ))
        });

        let transfer = client(http, Credential::new("abc", None));
        let result = transfer
            .send(
                &CancellationToken::new(),
                HttpRequest::new(HttpMethod::Get, "https://graph.example/v1.0/me"),
            )
            .await;

        match result {
            Err(TransferError::Api {
                status,
                code,
                request_id,
                ..
            }) => {
                assert_eq!(status, 200);
                assert_eq!(code, "accessDenied");
                assert_eq!(request_id.as_deref(), Some("r-1"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_error_code_is_not_an_error() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, r#"{"error": {"code": ""}, "value": []}"#)));

        let transfer = client(http, Credential::new("abc", None));
        let result = transfer
            .send(
                &CancellationToken::new(),
                HttpRequest::new(HttpMethod::Get, "https://graph.example/v1.0/me"),
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_non_2xx_without_envelope_is_status_error() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(502, "Bad Gateway")));

        let transfer = client(http, Credential::new("abc", None));
        let result = transfer
            .send(
                &CancellationToken::new(),
                HttpRequest::new(HttpMethod::Get, "https://graph.example/v1.0/me"),
            )
            .await;

        assert!(matches!(
            result,
            Err(TransferError::Status { status: 502, ref body }) if body == "Bad Gateway"
        ));
    }

    #[tokio::test]
    async fn test_transport_error_is_network() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Connection("reset".to_string())));

        let transfer = client(http, Credential::new("abc", None));
        let result = transfer
            .send(
                &CancellationToken::new(),
                HttpRequest::new(HttpMethod::Get, "https://graph.example/v1.0/me"),
            )
            .await;

        assert!(matches!(result, Err(TransferError::Network(_))));
    }

    #[tokio::test]
    async fn test_unauthenticated_send_has_no_bearer() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|request| {
            assert!(request.header_value("Authorization").is_none());
            Ok(response(202, r#"{"nextExpectedRanges": ["10-"]}"#))
        });

        let transfer = client(http, Credential::new("abc", None));
        let result = transfer
            .send_unauthenticated(
                &CancellationToken::new(),
                HttpRequest::new(HttpMethod::Put, "https://upload.example/session"),
            )
            .await;

        assert_eq!(result.unwrap().status, 202);
    }

    #[tokio::test]
    async fn test_missing_credential_sends_nothing() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let expired = Credential::new("abc", Some(chrono::Utc::now() - chrono::Duration::hours(1)));
        let transfer = client(http, expired);
        let result = transfer
            .get_bytes(&CancellationToken::new(), "https://graph.example/content")
            .await;

        assert!(matches!(
            result,
            Err(TransferError::Auth(AuthError::NoRefreshCapability))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let transfer = client(http, Credential::new("abc", None));
        let result = transfer
            .get_bytes(&cancel, "https://graph.example/content")
            .await;

        assert!(matches!(result, Err(TransferError::Cancelled)));
    }

    #[tokio::test]
    async fn test_get_bytes_ignores_envelope_shaped_content() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, r#"{"error": {"code": "stored"}}"#)));

        let transfer = client(http, Credential::new("abc", None));
        let body = transfer
            .get_bytes(&CancellationToken::new(), "https://graph.example/content")
            .await
            .unwrap();

        assert!(body.starts_with(b"{\"error\""));
    }

    #[test]
    fn test_long_error_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY * 2);
        let error = failure_from(HttpResponse {
            status: 500,
            headers: HashMap::new(),
            body: Bytes::from(body),
        });

        match error {
            TransferError::Status { body, .. } => assert_eq!(body.len(), MAX_ERROR_BODY),
            other => panic!("unexpected {:?}", other),
        }
    }
}
