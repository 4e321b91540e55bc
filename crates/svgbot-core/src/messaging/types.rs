use std::path::PathBuf;

use crate::domain::{ChatId, RemoteFile};

/// One inbound chat message, classified by shape.
///
/// Telegram-specific fields stay in the adapter; the adapter only hands over
/// the chat id, the message text and the attached document (if any).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Start {
        chat_id: ChatId,
    },
    Markup {
        chat_id: ChatId,
        text: String,
    },
    Document {
        chat_id: ChatId,
        file: RemoteFile,
    },
    /// Text and a document on the same message: both get handled, independently.
    MarkupWithDocument {
        chat_id: ChatId,
        text: String,
        file: RemoteFile,
    },
    Ignored {
        chat_id: ChatId,
    },
}

impl InboundEvent {
    /// Priority: start command, then text and/or document, then nothing.
    pub fn classify(
        chat_id: ChatId,
        text: Option<String>,
        file: Option<RemoteFile>,
        start_command: &str,
    ) -> Self {
        if text
            .as_deref()
            .is_some_and(|t| is_command(t, start_command))
        {
            return Self::Start { chat_id };
        }

        match (text, file) {
            (Some(text), Some(file)) => Self::MarkupWithDocument {
                chat_id,
                text,
                file,
            },
            (Some(text), None) => Self::Markup { chat_id, text },
            (None, Some(file)) => Self::Document { chat_id, file },
            (None, None) => Self::Ignored { chat_id },
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Start { chat_id }
            | Self::Markup { chat_id, .. }
            | Self::Document { chat_id, .. }
            | Self::MarkupWithDocument { chat_id, .. }
            | Self::Ignored { chat_id } => *chat_id,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Markup { .. } => "markup",
            Self::Document { .. } => "document",
            Self::MarkupWithDocument { .. } => "markup+document",
            Self::Ignored { .. } => "ignored",
        }
    }
}

/// Split `/cmd@botname args` into (`cmd`, `args`).
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }
    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    Some((cmd, rest))
}

/// True if `text` invokes `command` (e.g. `/start`, `/start@svgobot`, `/start payload`).
pub fn is_command(text: &str, command: &str) -> bool {
    let wanted = command.trim_start_matches('/').to_lowercase();
    parse_command(text).is_some_and(|(cmd, _)| !cmd.is_empty() && cmd == wanted)
}

/// Document sent back to the chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutgoingDocument {
    Path(PathBuf),
    Memory { file_name: String, bytes: Vec<u8> },
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}
