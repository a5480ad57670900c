//! Serve command - Telegram bot, dashboard and game timers in one process

use std::sync::Arc;

use tracing::{error, info};

use super::runtime;
use crate::bot::Dispatcher;
use crate::infrastructure::rate_limiter::RateLimiter;
use crate::infrastructure::services::EngineSettings;
use crate::infrastructure::telegram::{TelegramClient, UpdatePoller};

pub async fn run() -> anyhow::Result<()> {
    let (config, _log_guard) = runtime::bootstrap();

    let client = Arc::new(TelegramClient::from_config(&config.telegram)?);
    let pool = runtime::open_storage(&config).await?;
    let (games, pending) = runtime::sqlite_repositories(pool);
    let settings = EngineSettings::from(&config.game);
    let engine = runtime::build_engine(&config, settings, games, pending, client.clone());

    let loaded = engine.games().load_all().await?;
    let scheduled = engine.reschedule_all().await;
    engine.start_sweeper();
    info!(loaded, scheduled, "Games restored");

    let dispatcher = Arc::new(Dispatcher::new(
        engine.clone(),
        client.clone(),
        Arc::new(RateLimiter::from_config(&config.rate_limit)),
    ));

    let shutdown = runtime::shutdown_channel();
    let poller = UpdatePoller::new(client, dispatcher, config.telegram.poll_timeout_secs);
    let polling = tokio::spawn(poller.run(shutdown.clone()));

    let served = runtime::serve_dashboard(&config, engine.clone(), shutdown).await;

    engine.shutdown();
    if let Err(e) = polling.await {
        error!(error = %e, "Polling task ended abnormally");
    }

    info!("Shutdown complete");
    served
}
