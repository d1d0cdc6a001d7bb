//! Bearer-signing HTTP client.

use crate::error::AuthError;
use crate::manager::TokenManager;
use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// [`HttpClient`] that adds `Authorization: Bearer <token>` to every request.
///
/// The token is read from the [`TokenManager`] per request, so a long-lived
/// client keeps working across refreshes. Token acquisition observes the
/// cancellation token bound at construction.
#[derive(Clone)]
pub struct AuthenticatedClient {
    inner: Arc<dyn HttpClient>,
    tokens: Arc<TokenManager>,
    cancel: CancellationToken,
}

impl AuthenticatedClient {
    pub fn new(inner: Arc<dyn HttpClient>, tokens: Arc<TokenManager>) -> Self {
        Self {
            inner,
            tokens,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    async fn sign(&self, request: HttpRequest) -> Result<HttpRequest> {
        let (name, value) = self
            .tokens
            .authorization_header(&self.cancel)
            .await
            .map_err(into_bridge_error)?;
        Ok(request.header(name, value))
    }
}

fn into_bridge_error(error: AuthError) -> BridgeError {
    match error {
        AuthError::NetworkError(message) => BridgeError::Connection(message),
        other => BridgeError::NotAvailable(format!("No valid credential: {}", other)),
    }
}

#[async_trait]
impl HttpClient for AuthenticatedClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = self.sign(request).await?;
        self.inner.execute(request).await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let request = self.sign(request).await?;
        self.inner.execute_with_retry(request, policy).await
    }

    /// Buffers the signed GET; the inner streaming API cannot carry headers.
    async fn download_stream(
        &self,
        url: String,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let response = self.execute(HttpRequest::new(HttpMethod::Get, url)).await?;
        if !response.is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP error: {}",
                response.status
            )));
        }
        Ok(Box::new(std::io::Cursor::new(response.body)))
    }

    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }
}
