//! Outbound messages to the chat transport.

pub mod telegram;

use async_trait::async_trait;
use stage_flow::Reply;
use std::sync::Arc;
use tracing::{debug, error};

use crate::models::Recipient;

pub use telegram::TelegramClient;

/// One image of a grouped message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, to: &Recipient, reply: &Reply) -> anyhow::Result<()>;

    async fn send_photo(&self, to: &Recipient, bytes: Vec<u8>, caption: Option<String>) -> anyhow::Result<()>;

    async fn send_media_group(&self, to: &Recipient, items: Vec<MediaItem>) -> anyhow::Result<()>;

    async fn answer_callback(&self, bot_token: &str, callback_id: &str) -> anyhow::Result<()>;
}

/// A notifier bound to one conversation. Transport failures are logged and swallowed.
#[derive(Clone)]
pub struct Outbox {
    notifier: Arc<dyn Notifier>,
    to: Recipient,
}

impl Outbox {
    pub fn new(notifier: Arc<dyn Notifier>, to: Recipient) -> Self {
        Self { notifier, to }
    }

    pub async fn send(&self, reply: &Reply) {
        debug!(chat_id = %self.to.chat_id, "sending text");
        if let Err(e) = self.notifier.send_text(&self.to, reply).await {
            error!(chat_id = %self.to.chat_id, error = %e, "failed to send text");
        }
    }

    pub async fn say(&self, text: &str) {
        self.send(&Reply::plain(text)).await;
    }

    pub async fn photo(&self, bytes: Vec<u8>, caption: Option<String>) {
        if let Err(e) = self.notifier.send_photo(&self.to, bytes, caption).await {
            error!(chat_id = %self.to.chat_id, error = %e, "failed to send photo");
        }
    }

    pub async fn album(&self, items: Vec<MediaItem>) {
        let count = items.len();
        if let Err(e) = self.notifier.send_media_group(&self.to, items).await {
            error!(chat_id = %self.to.chat_id, items = count, error = %e, "failed to send media group");
        }
    }

    pub async fn ack(&self, callback_id: &str) {
        if let Err(e) = self
            .notifier
            .answer_callback(&self.to.bot_token, callback_id)
            .await
        {
            error!(chat_id = %self.to.chat_id, error = %e, "failed to answer callback");
        }
    }
}
