//! Telegram update handlers.
//!
//! The adapter only extracts the chat id, text and attached document from a
//! message; classification and processing live in `svgbot-core`.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use svgbot_core::{domain::ChatId, messaging::types::InboundEvent};

use crate::{remote_file, router::AppState};

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let event = inbound_event(&msg, &state.cfg.start_command);
    state.dispatcher.handle(event).await;
    Ok(())
}

fn inbound_event(msg: &Message, start_command: &str) -> InboundEvent {
    InboundEvent::classify(
        ChatId(msg.chat.id.0),
        msg.text().map(str::to_string),
        msg.document().map(remote_file),
        start_command,
    )
}
