use std::sync::Arc;

use svgbot_core::config::Config;

mod health;

#[tokio::main]
async fn main() -> Result<(), svgbot_core::Error> {
    svgbot_core::logging::init("svgbot")?;

    let cfg = Arc::new(Config::load()?);

    if let Some(port) = cfg.health_port {
        tokio::spawn(async move {
            if let Err(e) = health::serve(port).await {
                tracing::error!(error = %e, "health endpoint stopped");
            }
        });
    }

    svgbot_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| svgbot_core::Error::Transport(format!("telegram bot failed: {e}")))?;

    Ok(())
}
