use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use svgbot_core::{
    config::Config,
    dispatcher::{DispatcherPorts, RequestDispatcher},
    optimizer::{MinifyEngine, MinifyOptions},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub dispatcher: Arc<RequestDispatcher>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, bot: Bot) -> Self {
        let telegram = Arc::new(TelegramMessenger::new(bot));
        let optimizer = Arc::new(MinifyEngine::new(MinifyOptions {
            float_precision: cfg.float_precision,
        }));
        let dispatcher = RequestDispatcher::new(
            cfg.clone(),
            DispatcherPorts {
                messenger: telegram.clone(),
                files: telegram,
                optimizer,
            },
        );
        Self {
            cfg,
            dispatcher: Arc::new(dispatcher),
        }
    }
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "svgbot started"),
        Err(e) => tracing::warn!(error = %e, "get_me failed"),
    }
    tracing::info!(
        storage = %cfg.storage_dir.display(),
        cleanup_delay_secs = cfg.cleanup_delay.as_secs(),
        "working files"
    );

    let state = Arc::new(AppState::new(cfg, bot.clone()));

    // Files from a previous run are not tracked by this process's scheduler.
    if let Err(e) = state.dispatcher.sweep_leftovers().await {
        tracing::warn!(error = %e, "leftover sweep failed");
    }

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    let pending = state.dispatcher.cleanup().pending();
    if !pending.is_empty() {
        tracing::info!(
            count = pending.len(),
            "shutting down with pending cleanups; they will be swept on next start"
        );
    }

    Ok(())
}
