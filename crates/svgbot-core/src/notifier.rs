use std::sync::Arc;

use crate::{
    domain::ChatId,
    messaging::{
        port::MessagingPort,
        types::{MessagingCapabilities, OutgoingDocument},
    },
    Error, Result,
};

/// Sends results back to a conversation.
///
/// `send_*` report delivery failures to the caller; `notify` and `report` are
/// best-effort and only log when the transport refuses the message.
#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn MessagingPort>,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self { messenger }
    }

    pub fn capabilities(&self) -> MessagingCapabilities {
        self.messenger.capabilities()
    }

    pub async fn send_text(&self, chat_id: ChatId, html: &str) -> Result<()> {
        self.messenger.send_html(chat_id, html).await
    }

    pub async fn send_document(&self, chat_id: ChatId, doc: OutgoingDocument) -> Result<()> {
        self.messenger.send_document(chat_id, doc).await
    }

    pub async fn notify(&self, chat_id: ChatId, html: &str) {
        match self.messenger.send_html(chat_id, html).await {
            Ok(()) => tracing::debug!(%chat_id, "message sent"),
            Err(e) => tracing::warn!(%chat_id, error = %e, "text sending failed"),
        }
    }

    /// Turn a sub-flow failure into the one message the user sees.
    pub async fn report(&self, chat_id: ChatId, err: &Error) {
        tracing::info!(%chat_id, error = %err, "request failed");
        self.notify(chat_id, &err.user_html()).await;
    }
}
