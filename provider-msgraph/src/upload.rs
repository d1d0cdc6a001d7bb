//! Drive uploads: a single PUT for small files, a resumable upload session
//! with sequential byte-range commits for everything else.

use bridge_traits::http::{HttpMethod, HttpRequest, RetryPolicy};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_runtime::config::{ClientConfig, UploadConfig};
use core_runtime::logging::{redact_url, strip_path};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{TransferError, UploadError};
use crate::mime::mime_for;
use crate::transfer::{self, TransferClient};
use crate::types::{CreateUploadSessionRequest, Entry, UploadItemProperties, UploadSessionResponse};

/// Conflict behaviour requested when creating an upload session
const CONFLICT_BEHAVIOR: &str = "replace";

/// Upper bound on the backoff between chunk attempts
const MAX_CHUNK_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Server-side upload session.
///
/// `bytes_committed` only ever counts acknowledged chunks, so a session left
/// behind by a failed or cancelled commit can be resumed by calling
/// [`UploadEngine::commit_session`] again with content positioned at
/// `bytes_committed`.
#[derive(Clone)]
pub struct UploadSession {
    /// Pre-authenticated chunk target
    pub upload_url: String,
    pub total_size: u64,
    pub bytes_committed: u64,
    /// Body of the most recent acknowledged chunk
    pub last_response: Option<serde_json::Value>,
    pub expiration: Option<DateTime<Utc>>,
}

impl UploadSession {
    pub fn new(upload_url: impl Into<String>, total_size: u64) -> Self {
        Self {
            upload_url: upload_url.into(),
            total_size,
            bytes_committed: 0,
            last_response: None,
            expiration: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_size > 0 && self.bytes_committed >= self.total_size
    }

    pub fn remaining(&self) -> u64 {
        self.total_size.saturating_sub(self.bytes_committed)
    }
}

impl fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSession")
            .field("upload_url", &redact_url(&self.upload_url))
            .field("total_size", &self.total_size)
            .field("bytes_committed", &self.bytes_committed)
            .field("expiration", &self.expiration)
            .finish()
    }
}

pub struct UploadEngine {
    transfer: Arc<TransferClient>,
    graph_v1: String,
    site_id: String,
    config: UploadConfig,
}

impl UploadEngine {
    pub fn new(config: &ClientConfig, transfer: Arc<TransferClient>) -> Self {
        Self {
            transfer,
            graph_v1: config.endpoints.graph_v1(),
            site_id: config.site_id.clone(),
            config: config.upload.clone(),
        }
    }

    /// Replace the sizing, rejecting chunk sizes that are not 320 KiB aligned.
    pub fn with_upload_config(mut self, upload: UploadConfig) -> core_runtime::Result<Self> {
        upload.validate()?;
        self.config = upload;
        Ok(self)
    }

    pub fn upload_config(&self) -> &UploadConfig {
        &self.config
    }

    /// Upload `file_size` bytes read from `content` as `file_name` in `folder_id`.
    ///
    /// Files below the small-file threshold (zero-byte files included) go
    /// through one PUT; larger files through an upload session.
    ///
    /// # Errors
    ///
    /// [`UploadError::UnsupportedExtension`] is returned before any request
    /// when the extension has no known MIME type.
    #[instrument(skip(self, cancel, file_name, content), fields(file = %strip_path(file_name), size = file_size))]
    pub async fn upload<R>(
        &self,
        cancel: &CancellationToken,
        folder_id: &str,
        file_name: &str,
        file_size: u64,
        mut content: R,
    ) -> Result<Entry, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mime_type = mime_for(file_name)
            .ok_or_else(|| UploadError::UnsupportedExtension(file_name.to_string()))?;

        if file_size < self.config.small_file_threshold {
            return self
                .upload_small(cancel, folder_id, file_name, mime_type, file_size, &mut content)
                .await;
        }

        let mut session = self
            .create_session(cancel, folder_id, file_name, file_size)
            .await?;
        self.commit_session(cancel, &mut session, &mut content).await
    }

    async fn upload_small<R>(
        &self,
        cancel: &CancellationToken,
        folder_id: &str,
        file_name: &str,
        mime_type: &str,
        file_size: u64,
        content: &mut R,
    ) -> Result<Entry, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let body = read_chunk(cancel, content, file_size as usize).await?;

        let url = format!(
            "{}/sites/{}/drive/items/{}:/{}:/content",
            self.graph_v1,
            urlencoding::encode(&self.site_id),
            urlencoding::encode(folder_id),
            urlencoding::encode(file_name)
        );
        debug!(mime_type, "Direct upload");

        let request = HttpRequest::new(HttpMethod::Put, url)
            .header("Content-Type", mime_type)
            .header("Content-Length", file_size.to_string())
            .body(body);

        let response = self.transfer.send(cancel, request).await?;
        let entry: Entry = transfer::decode(&response)
            .map_err(|e| UploadError::ResponseDecodeFailed(e.to_string()))?;

        info!(id = %entry.id, "Uploaded file");
        Ok(entry)
    }

    /// Open an upload session for `file_name` in `folder_id`.
    #[instrument(skip(self, cancel, file_name), fields(file = %strip_path(file_name), size = file_size))]
    pub async fn create_session(
        &self,
        cancel: &CancellationToken,
        folder_id: &str,
        file_name: &str,
        file_size: u64,
    ) -> Result<UploadSession, UploadError> {
        let url = format!(
            "{}/me/drive/items/{}:/{}:/createUploadSession",
            self.graph_v1,
            urlencoding::encode(folder_id),
            urlencoding::encode(file_name)
        );

        let body = CreateUploadSessionRequest {
            item: UploadItemProperties {
                conflict_behavior: CONFLICT_BEHAVIOR.to_string(),
                name: file_name.to_string(),
            },
        };
        let request = HttpRequest::new(HttpMethod::Post, url)
            .json(&body)
            .map_err(|e| UploadError::SessionCreationFailed(TransferError::Decode(e.to_string())))?;

        let response = self
            .transfer
            .send(cancel, request)
            .await
            .map_err(|e| match e {
                TransferError::Cancelled => UploadError::Cancelled,
                other => UploadError::SessionCreationFailed(other),
            })?;

        let created: UploadSessionResponse =
            transfer::decode(&response).map_err(UploadError::SessionCreationFailed)?;

        let upload_url = created
            .upload_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                UploadError::SessionCreationFailed(TransferError::Decode(
                    "uploadUrl missing from upload session response".to_string(),
                ))
            })?;

        info!(url = %redact_url(&upload_url), "Created upload session");

        let mut session = UploadSession::new(upload_url, file_size);
        session.expiration = created.expiration_date_time;
        Ok(session)
    }

    /// Commit the rest of `session` from `content` and return the created item.
    ///
    /// `content` must be positioned at `session.bytes_committed`. Chunks are
    /// sent one at a time in byte order; each is retried on its own budget.
    /// On error the session keeps the progress made so far.
    #[instrument(skip(self, cancel, session, content), fields(total = session.total_size, committed = session.bytes_committed))]
    pub async fn commit_session<R>(
        &self,
        cancel: &CancellationToken,
        session: &mut UploadSession,
        content: &mut R,
    ) -> Result<Entry, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        if session.total_size == 0 {
            return Err(UploadError::InvalidSession(
                "session has zero total size".to_string(),
            ));
        }
        if session.is_complete() {
            return Err(UploadError::InvalidSession(
                "session is already complete".to_string(),
            ));
        }

        let policy = RetryPolicy {
            max_attempts: self.config.chunk_max_attempts.max(1),
            base_delay: self.config.retry_base_delay,
            max_delay: MAX_CHUNK_RETRY_DELAY,
            use_exponential_backoff: true,
        };

        loop {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let start = session.bytes_committed;
            let len = self.config.chunk_size.min(session.remaining());
            let chunk = read_chunk(cancel, content, len as usize).await?;

            let body = self.commit_chunk(cancel, session, start, chunk, &policy).await?;
            session.bytes_committed = start + len;

            if session.is_complete() {
                let entry: Entry = serde_json::from_slice(&body)
                    .map_err(|e| UploadError::ResponseDecodeFailed(e.to_string()))?;
                session.last_response = serde_json::to_value(&entry).ok();
                info!(id = %entry.id, size = session.total_size, "Upload session complete");
                return Ok(entry);
            }

            let progress: Option<serde_json::Value> = serde_json::from_slice(&body).ok();
            if let Some(expiration) = progress
                .as_ref()
                .and_then(|value| serde_json::from_value::<UploadSessionResponse>(value.clone()).ok())
                .and_then(|parsed| parsed.expiration_date_time)
            {
                session.expiration = Some(expiration);
            }
            session.last_response = progress;

            debug!(
                committed = session.bytes_committed,
                total = session.total_size,
                "Chunk committed"
            );
        }
    }

    async fn commit_chunk(
        &self,
        cancel: &CancellationToken,
        session: &UploadSession,
        start: u64,
        chunk: Bytes,
        policy: &RetryPolicy,
    ) -> Result<Bytes, UploadError> {
        let len = chunk.len() as u64;
        let range = format!("bytes {}-{}/{}", start, start + len - 1, session.total_size);
        let mut attempt = 1;

        loop {
            let request = HttpRequest::new(HttpMethod::Put, &session.upload_url)
                .header("Content-Range", &range)
                .header("Content-Length", len.to_string())
                .body(chunk.clone());

            match self.transfer.send_unauthenticated(cancel, request).await {
                Ok(response) => return Ok(response.body),
                Err(TransferError::Cancelled) => return Err(UploadError::Cancelled),
                Err(cause) if attempt >= policy.max_attempts => {
                    warn!(offset = start, attempts = attempt, error = %cause, "Chunk commit failed");
                    return Err(UploadError::ChunkCommitFailed {
                        offset: start,
                        cause,
                    });
                }
                Err(cause) => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        offset = start,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %cause,
                        "Chunk commit failed, retrying in {:?}",
                        delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Read exactly `len` bytes; a short source is an `UnexpectedEof` error.
async fn read_chunk<R>(
    cancel: &CancellationToken,
    content: &mut R,
    len: usize,
) -> Result<Bytes, UploadError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buffer = vec![0u8; len];
    let read = tokio::select! {
        _ = cancel.cancelled() => return Err(UploadError::Cancelled),
        read = content.read_exact(&mut buffer) => read,
    };
    read?;
    Ok(Bytes::from(buffer))
}
