//! Dashboard command - operator pages without polling or timers

use std::sync::Arc;

use clap::Args;
use tracing::{info, warn};

use super::runtime;
use crate::config::AppConfig;
use crate::domain::Messenger;
use crate::infrastructure::services::EngineSettings;
use crate::infrastructure::storage::{InMemoryGameRepository, InMemoryPendingActionRepository};
use crate::infrastructure::telegram::{OfflineMessenger, TelegramClient};

#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardArgs {
    /// Keep games in memory instead of opening the database file
    #[arg(long)]
    pub in_memory: bool,
}

pub async fn run(args: DashboardArgs) -> anyhow::Result<()> {
    let (config, _log_guard) = runtime::bootstrap();

    // Re-sending a role posts to the group and needs the bot token
    let messenger: Arc<dyn Messenger> = match TelegramClient::from_config(&config.telegram) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!(error = %e, "Role re-sending is disabled");
            Arc::new(OfflineMessenger)
        }
    };

    let settings = dashboard_settings(&config);
    let engine = if args.in_memory {
        let pending = Arc::new(InMemoryPendingActionRepository::new());
        let games = Arc::new(InMemoryGameRepository::with_pending_actions(pending.clone()));
        info!("Using in-memory storage; nothing is persisted");
        runtime::build_engine(&config, settings, games, pending, messenger)
    } else {
        let pool = runtime::open_storage(&config).await?;
        let (games, pending) = runtime::sqlite_repositories(pool);
        runtime::build_engine(&config, settings, games, pending, messenger)
    };

    let loaded = engine.games().load_all().await?;
    info!(loaded, "Games loaded; timers are not run in dashboard mode");

    runtime::serve_dashboard(&config, engine, runtime::shutdown_channel()).await
}

/// Phase jobs belong to the `serve` process; the dashboard only edits state
fn dashboard_settings(config: &AppConfig) -> EngineSettings {
    EngineSettings::from(&config.game).without_timers()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game::{unix_now, Game};
    use crate::domain::{GameRepository, Phase, RoleKey};
    use crate::infrastructure::scheduler::{JobKind, GLOBAL_CHAT};

    #[tokio::test]
    async fn test_dashboard_engine_arms_no_timers() {
        let config = AppConfig::default();
        let pending = Arc::new(InMemoryPendingActionRepository::new());
        let games = Arc::new(InMemoryGameRepository::with_pending_actions(pending.clone()));

        let mut game = Game::new(-100, 1);
        for (id, role) in [(1, RoleKey::Mafioso), (2, RoleKey::Citizen)] {
            game.add_player(id, format!("P{}", id)).unwrap();
            game.player_mut(id).unwrap().role = Some(role);
        }
        game.enter_phase(Phase::Night, Some(unix_now() + 300));
        games.save(&game).await.unwrap();

        let engine = runtime::build_engine(
            &config,
            dashboard_settings(&config),
            games,
            pending,
            Arc::new(OfflineMessenger),
        );
        engine.games().load_all().await.unwrap();
        engine.start_sweeper();

        let updated = engine.update_times(100, Some(600), None).await.unwrap();

        assert_eq!(updated.used_id, -100);
        assert_eq!(updated.night_seconds, 600);
        let scheduler = engine.scheduler();
        assert!(!scheduler.is_scheduled(-100, JobKind::NightEnd));
        assert!(!scheduler.is_scheduled(-100, JobKind::Reminder));
        assert!(!scheduler.is_scheduled(GLOBAL_CHAT, JobKind::Sweep));
        assert_eq!(engine.reschedule_all().await, 0);
    }
}
