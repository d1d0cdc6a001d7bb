//! Signed-in user's Outlook messages.

use core_runtime::config::ClientConfig;
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::transfer::TransferClient;
use crate::types::{Message, MessagePage};

pub struct Mailbox {
    transfer: Arc<TransferClient>,
    graph_v1: String,
}

impl Mailbox {
    pub fn new(config: &ClientConfig, transfer: Arc<TransferClient>) -> Self {
        Self {
            transfer,
            graph_v1: config.endpoints.graph_v1(),
        }
    }

    fn messages_url(&self, top: u32, select: &[&str]) -> String {
        let mut url = format!("{}/me/messages?$top={}", self.graph_v1, top);
        if !select.is_empty() {
            let fields: Vec<String> = select
                .iter()
                .map(|field| urlencoding::encode(field).into_owned())
                .collect();
            url.push_str("&$select=");
            url.push_str(&fields.join(","));
        }
        url
    }

    /// Up to `top` most recent messages, each fetched in full by id.
    ///
    /// `select` narrows the properties of the initial listing only. Messages
    /// without an id are skipped.
    #[instrument(skip(self, cancel, select))]
    pub async fn messages(
        &self,
        cancel: &CancellationToken,
        top: u32,
        select: &[&str],
    ) -> Result<Vec<Message>> {
        let page: MessagePage = self
            .transfer
            .get_json(cancel, &self.messages_url(top, select))
            .await?;

        let mut messages = Vec::with_capacity(page.value.len());
        for summary in page.value.into_iter().filter(|m| !m.id.is_empty()) {
            messages.push(self.message(cancel, &summary.id).await?);
        }

        debug!(count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    /// One message by id
    pub async fn message(&self, cancel: &CancellationToken, id: &str) -> Result<Message> {
        let url = format!("{}/me/messages/{}", self.graph_v1, urlencoding::encode(id));
        let message: Message = self.transfer.get_json(cancel, &url).await?;

        let sender = message
            .from
            .as_ref()
            .and_then(|from| from.email_address.as_ref())
            .and_then(|email| email.address.as_deref())
            .unwrap_or_default();
        debug!(id, from = %redact_if_sensitive("from", sender), "Fetched message");
        Ok(message)
    }
}
