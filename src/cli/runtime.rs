//! Wiring shared by the run modes

use std::net::SocketAddr;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sqlx::sqlite::SqlitePool;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::api::{create_router, AppState};
use crate::config::AppConfig;
use crate::domain::{GameRepository, Messenger, PendingActionRepository};
use crate::infrastructure::logging;
use crate::infrastructure::scheduler::JobScheduler;
use crate::infrastructure::services::{
    EngineSettings, GameDefaults, GameEngine, GameManager, PendingActionService,
};
use crate::infrastructure::storage::{
    connect, run_storage_migrations, SqliteConfig, SqliteGameRepository,
    SqlitePendingActionRepository,
};

const GENERATED_TOKEN_BYTES: usize = 24;

/// Load `.env`, the layered configuration and the log subscriber.
/// A configuration that fails to load is replaced by the defaults.
pub fn bootstrap() -> (AppConfig, Option<WorkerGuard>) {
    dotenvy::dotenv().ok();

    let loaded = AppConfig::load();
    let config = loaded.as_ref().cloned().unwrap_or_default();
    let guard = logging::init_logging(&logging::LoggingConfig::from(&config.logging));

    if let Err(e) = loaded {
        warn!(error = %e, "Invalid configuration, using defaults");
    }

    (config, guard)
}

/// Connect to the database file and bring the schema up to date
pub async fn open_storage(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    let pool = connect(&SqliteConfig::from(&config.database)).await?;
    run_storage_migrations(&pool).await?;

    info!(file = %config.database.file, "Storage ready");
    Ok(pool)
}

pub fn sqlite_repositories(
    pool: SqlitePool,
) -> (Arc<dyn GameRepository>, Arc<dyn PendingActionRepository>) {
    (
        Arc::new(SqliteGameRepository::new(pool.clone())),
        Arc::new(SqlitePendingActionRepository::new(pool)),
    )
}

pub fn build_engine(
    config: &AppConfig,
    settings: EngineSettings,
    games: Arc<dyn GameRepository>,
    pending: Arc<dyn PendingActionRepository>,
    messenger: Arc<dyn Messenger>,
) -> Arc<GameEngine> {
    let games = GameManager::new(games).with_defaults(GameDefaults {
        night_seconds: config.game.night_seconds,
        day_seconds: config.game.day_seconds,
        reminder_seconds: config.game.reminder_seconds,
    });
    let actions = PendingActionService::new(pending, config.game.pending_action_ttl_secs);

    Arc::new(GameEngine::new(
        Arc::new(games),
        Arc::new(actions),
        messenger,
        Arc::new(JobScheduler::new()),
        settings,
    ))
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; GENERATED_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Configured dashboard token, or a fresh one for this process
pub fn dashboard_token(config: &AppConfig) -> String {
    match config
        .dashboard
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        Some(token) => token.to_string(),
        None => {
            let token = generate_token();
            warn!(
                token = %token,
                "MAFIA_DASH_TOKEN is not set; generated a dashboard token for this run"
            );
            token
        }
    }
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}

/// Serve the dashboard until `shutdown` flips to true
pub async fn serve_dashboard(
    config: &AppConfig,
    engine: Arc<GameEngine>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let state = AppState::new(engine, dashboard_token(config));
    let addr = build_socket_addr(config)?;

    info!("Starting dashboard on {}", addr);
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    info!("Dashboard shutdown complete");
    Ok(())
}

/// Flip the returned channel on Ctrl+C or SIGTERM
pub fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
    });
    rx
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
