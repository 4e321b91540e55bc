use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::{
    domain::{ChatId, RemoteFile, RemoteFileMeta},
    messaging::types::{MessagingCapabilities, OutgoingDocument},
    Result,
};

/// Outbound side of the chat transport.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()>;
    async fn send_document(&self, chat_id: ChatId, doc: OutgoingDocument) -> Result<()>;
}

/// Remote file retrieval (Telegram `getFile` + file download).
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Look up the download path and size of an announced file.
    async fn resolve(&self, file: &RemoteFile) -> Result<RemoteFileMeta>;

    /// Stream the file content into `dst`.
    async fn download(
        &self,
        meta: &RemoteFileMeta,
        dst: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<()>;
}
