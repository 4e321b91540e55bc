//! Telegram adapter (teloxide).
//!
//! This crate implements the `svgbot-core` MessagingPort and FileSource over
//! the Telegram Bot API.

use async_trait::async_trait;

use teloxide::{
    net::Download,
    prelude::*,
    types::{InputFile, ParseMode},
};

use tokio::io::AsyncWrite;

pub mod handlers;
pub mod router;

use svgbot_core::{
    domain::{ChatId, RemoteFile, RemoteFileMeta},
    errors::Error,
    messaging::{
        port::{FileSource, MessagingPort},
        types::{MessagingCapabilities, OutgoingDocument},
    },
    Result,
};

/// Telegram rejects text messages longer than this many characters.
const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: TELEGRAM_MAX_MESSAGE_LEN,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()> {
        self.bot
            .send_message(Self::tg_chat(chat_id), html.to_string())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn send_document(&self, chat_id: ChatId, doc: OutgoingDocument) -> Result<()> {
        let input = match doc {
            OutgoingDocument::Path(path) => InputFile::file(path),
            OutgoingDocument::Memory { file_name, bytes } => {
                InputFile::memory(bytes).file_name(file_name)
            }
        };
        self.bot
            .send_document(Self::tg_chat(chat_id), input)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}

#[async_trait]
impl FileSource for TelegramMessenger {
    async fn resolve(&self, file: &RemoteFile) -> Result<RemoteFileMeta> {
        let meta = self
            .bot
            .get_file(file.file_id.clone())
            .await
            .map_err(Self::map_err)?;

        let size = u64::from(meta.size);
        Ok(RemoteFileMeta {
            file_id: file.file_id.clone(),
            path: meta.path,
            size,
        })
    }

    async fn download(
        &self,
        meta: &RemoteFileMeta,
        dst: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<()> {
        self.bot
            .download_file(&meta.path, dst)
            .await
            .map_err(|e| Error::Transport(format!("telegram download error: {e}")))?;
        Ok(())
    }
}

/// Map a Telegram document to the transport-neutral upload description.
pub fn remote_file(doc: &teloxide::types::Document) -> RemoteFile {
    RemoteFile {
        file_id: doc.file.id.clone(),
        file_name: doc.file_name.clone(),
        size: Some(u64::from(doc.file.size)),
    }
}
