//! Shared fixtures for provider-msgraph integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_auth::{Credential, TokenManager};
use core_runtime::config::{ClientConfig, Endpoints, UploadConfig};
use provider_msgraph::TransferClient;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const GRAPH: &str = "http://graph.test";

/// One scripted reaction of the fake server
pub enum Scripted {
    Respond(u16, String),
    Fail(BridgeError),
    /// Cancel the token, then never answer
    CancelAndHang(CancellationToken),
}

/// `HttpClient` answering from a fixed script and recording every request
#[derive(Default)]
pub struct ScriptedHttp {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.push(Scripted::Respond(status, body.into()))
    }

    pub fn fail(self, error: BridgeError) -> Self {
        self.push(Scripted::Fail(error))
    }

    pub fn cancel_and_hang(self, cancel: CancellationToken) -> Self {
        self.push(Scripted::CancelAndHang(cancel))
    }

    fn push(self, step: Scripted) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self.script.lock().unwrap().pop_front();

        match step {
            Some(Scripted::Respond(status, body)) => Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::from(body),
            }),
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::CancelAndHang(cancel)) => {
                cancel.cancel();
                std::future::pending().await
            }
            None => panic!("unscripted request: {} {}", request.method, request.url),
        }
    }

    async fn download_stream(
        &self,
        url: String,
    ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        Err(BridgeError::NotAvailable(format!("download_stream({url})")))
    }
}

/// Graph config pointing at the fake host with small upload sizing
pub fn config() -> ClientConfig {
    ClientConfig::builder()
        .tenant_id("tenant")
        .client_id("client")
        .endpoints(Endpoints {
            graph_host: GRAPH.to_string(),
            ..Endpoints::default()
        })
        .upload(UploadConfig {
            small_file_threshold: 2 * core_runtime::config::UPLOAD_CHUNK_ALIGNMENT,
            chunk_size: core_runtime::config::UPLOAD_CHUNK_ALIGNMENT,
            chunk_max_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
        })
        .build()
        .unwrap()
}

/// Transfer client over `http` with a long-lived bearer token
pub fn transfer(http: Arc<ScriptedHttp>) -> Arc<TransferClient> {
    let tokens = TokenManager::new(Credential::new("test-token", None), Arc::new(ScriptedHttp::new()));
    Arc::new(TransferClient::new(http, Arc::new(tokens)))
}

/// Page body with the given ids, all under `parent`
pub fn page(ids: &[&str], parent: &str, next_link: Option<&str>) -> String {
    let value: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "name": format!("{id}.txt"),
                "parentReference": {"id": parent}
            })
        })
        .collect();

    let mut body = serde_json::json!({ "value": value });
    if let Some(link) = next_link {
        body["@odata.nextLink"] = serde_json::Value::String(link.to_string());
    }
    body.to_string()
}

/// `(start, end, total)` parsed from a `Content-Range: bytes s-e/t` header
pub fn content_range(request: &HttpRequest) -> Option<(u64, u64, u64)> {
    let value = request.header_value("Content-Range")?;
    let range = value.strip_prefix("bytes ")?;
    let (span, total) = range.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?, total.parse().ok()?))
}
