//! SQLite game repository implementation

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::warn;

use crate::domain::game::{
    default_roles_config, ChatId, Game, GameRepository, NightState, Phase, Player,
    DEFAULT_DAY_SECONDS, DEFAULT_NIGHT_SECONDS, DEFAULT_REMINDER_SECONDS,
};
use crate::domain::{DomainError, RoleKey};

/// SQLite implementation of GameRepository
#[derive(Debug, Clone)]
pub struct SqliteGameRepository {
    pool: SqlitePool,
}

impl SqliteGameRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_players(&self, chat_id: ChatId) -> Result<Vec<Player>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, name, role_key, alive, blocked, silenced, dm_sent_ok
            FROM players
            WHERE chat_id = ?
            ORDER BY user_id
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load players: {}", e)))?;

        rows.iter().map(row_to_player).collect()
    }
}

#[async_trait]
impl GameRepository for SqliteGameRepository {
    async fn find(&self, chat_id: ChatId) -> Result<Option<Game>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT chat_id, host_id, phase, roles_config, night_seconds, day_seconds,
                   periodic_reminder_seconds, phase_deadline, created_at, updated_at,
                   night_state
            FROM games
            WHERE chat_id = ?
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get game: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut game = row_to_game(&row)?;
        for player in self.load_players(chat_id).await? {
            game.players.insert(player.user_id, player);
        }

        Ok(Some(game))
    }

    async fn list_ids(&self) -> Result<Vec<ChatId>, DomainError> {
        sqlx::query_scalar("SELECT chat_id FROM games ORDER BY chat_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list games: {}", e)))
    }

    async fn save(&self, game: &Game) -> Result<(), DomainError> {
        let roles_json = serde_json::to_string(&game.roles_config)
            .map_err(|e| DomainError::internal(format!("Failed to encode roles: {}", e)))?;
        let night_json = serde_json::to_string(&game.night)
            .map_err(|e| DomainError::internal(format!("Failed to encode night state: {}", e)))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO games (chat_id, host_id, phase, roles_config, night_seconds, day_seconds,
                               periodic_reminder_seconds, phase_deadline, created_at, updated_at,
                               night_state)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(chat_id) DO UPDATE SET
                host_id = excluded.host_id,
                phase = excluded.phase,
                roles_config = excluded.roles_config,
                night_seconds = excluded.night_seconds,
                day_seconds = excluded.day_seconds,
                periodic_reminder_seconds = excluded.periodic_reminder_seconds,
                phase_deadline = excluded.phase_deadline,
                updated_at = excluded.updated_at,
                night_state = excluded.night_state
            "#,
        )
        .bind(game.chat_id)
        .bind(game.host_id)
        .bind(game.phase.as_str())
        .bind(&roles_json)
        .bind(game.night_seconds)
        .bind(game.day_seconds)
        .bind(game.periodic_reminder_seconds)
        .bind(game.phase_deadline)
        .bind(game.created_at)
        .bind(game.updated_at)
        .bind(&night_json)
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to save game: {}", e)))?;

        sqlx::query("DELETE FROM players WHERE chat_id = ?")
            .bind(game.chat_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to clear players: {}", e)))?;

        for player in game.players.values() {
            sqlx::query(
                r#"
                INSERT INTO players (chat_id, user_id, name, role_key, alive, blocked, silenced,
                                     dm_sent_ok)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(game.chat_id)
            .bind(player.user_id)
            .bind(&player.name)
            .bind(player.role.map(|r| r.as_str()))
            .bind(player.alive)
            .bind(player.blocked)
            .bind(player.silenced)
            .bind(player.dm_sent_ok)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to save player: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit game: {}", e)))?;

        Ok(())
    }

    async fn delete(&self, chat_id: ChatId) -> Result<bool, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        for table in ["players", "pending_actions"] {
            sqlx::query(&format!("DELETE FROM {} WHERE chat_id = ?", table))
                .bind(chat_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to delete {}: {}", table, e)))?;
        }

        let result = sqlx::query("DELETE FROM games WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete game: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit delete: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

fn storage_err(e: sqlx::Error) -> DomainError {
    DomainError::storage(format!("Failed to read row: {}", e))
}

/// Zero or missing durations fall back to the defaults
fn positive_or(value: Option<i64>, default: i64) -> i64 {
    value.filter(|v| *v > 0).unwrap_or(default)
}

fn row_to_game(row: &SqliteRow) -> Result<Game, DomainError> {
    let chat_id: ChatId = row.try_get("chat_id").map_err(storage_err)?;
    let host_id: Option<i64> = row.try_get("host_id").map_err(storage_err)?;
    let mut game = Game::new(chat_id, host_id.unwrap_or_default());

    let phase: Option<String> = row.try_get("phase").map_err(storage_err)?;
    game.phase = phase.as_deref().map(Phase::parse_lossy).unwrap_or_default();

    let roles: Option<String> = row.try_get("roles_config").map_err(storage_err)?;
    game.roles_config = roles
        .as_deref()
        .and_then(|json| parse_lossy::<BTreeMap<RoleKey, i64>>(chat_id, "roles_config", json))
        .unwrap_or_else(default_roles_config);

    let night: Option<String> = row.try_get("night_state").map_err(storage_err)?;
    game.night = night
        .as_deref()
        .and_then(|json| parse_lossy::<NightState>(chat_id, "night_state", json))
        .unwrap_or_default();

    game.night_seconds = positive_or(
        row.try_get("night_seconds").map_err(storage_err)?,
        DEFAULT_NIGHT_SECONDS,
    );
    game.day_seconds = positive_or(
        row.try_get("day_seconds").map_err(storage_err)?,
        DEFAULT_DAY_SECONDS,
    );
    game.periodic_reminder_seconds = positive_or(
        row.try_get("periodic_reminder_seconds").map_err(storage_err)?,
        DEFAULT_REMINDER_SECONDS,
    );
    game.phase_deadline = row.try_get("phase_deadline").map_err(storage_err)?;

    if let Some(created_at) = row.try_get::<Option<i64>, _>("created_at").map_err(storage_err)? {
        game.created_at = created_at;
    }
    if let Some(updated_at) = row.try_get::<Option<i64>, _>("updated_at").map_err(storage_err)? {
        game.updated_at = updated_at;
    }

    Ok(game)
}

fn parse_lossy<T: serde::de::DeserializeOwned>(
    chat_id: ChatId,
    column: &str,
    json: &str,
) -> Option<T> {
    match serde_json::from_str(json) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(chat_id, column, error = %e, "Ignoring unreadable JSON column");
            None
        }
    }
}

fn row_to_player(row: &SqliteRow) -> Result<Player, DomainError> {
    let user_id: i64 = row.try_get("user_id").map_err(storage_err)?;
    let name: Option<String> = row.try_get("name").map_err(storage_err)?;
    let role_key: Option<String> = row.try_get("role_key").map_err(storage_err)?;
    let flag = |column: &str| -> Result<bool, DomainError> {
        let value: Option<i64> = row.try_get(column).map_err(storage_err)?;
        Ok(value.unwrap_or(0) != 0)
    };

    Ok(Player {
        user_id,
        name: name.unwrap_or_else(|| user_id.to_string()),
        role: role_key.and_then(|k| k.parse::<RoleKey>().ok()),
        alive: flag("alive")?,
        blocked: flag("blocked")?,
        silenced: flag("silenced")?,
        dm_sent_ok: flag("dm_sent_ok")?,
    })
}
