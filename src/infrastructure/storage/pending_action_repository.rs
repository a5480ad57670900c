//! SQLite pending action repository implementation

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::warn;

use crate::domain::game::{ChatId, UserId};
use crate::domain::pending_action::{
    ActionExtra, ActionKind, PendingAction, PendingActionRepository,
};
use crate::domain::DomainError;

/// SQLite implementation of PendingActionRepository
#[derive(Debug, Clone)]
pub struct SqlitePendingActionRepository {
    pool: SqlitePool,
}

impl SqlitePendingActionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT key, chat_id, message_id, action, actor_id, extra_json, created_at, expires_at FROM pending_actions";

#[async_trait]
impl PendingActionRepository for SqlitePendingActionRepository {
    async fn upsert(&self, action: &PendingAction) -> Result<(), DomainError> {
        let extra = serde_json::to_string(&action.extra())
            .map_err(|e| DomainError::internal(format!("Failed to encode action extra: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO pending_actions (key, chat_id, message_id, action, actor_id, extra_json,
                                         created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                chat_id = excluded.chat_id,
                message_id = excluded.message_id,
                action = excluded.action,
                actor_id = excluded.actor_id,
                extra_json = excluded.extra_json,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&action.key)
        .bind(action.chat_id)
        .bind(action.message_id)
        .bind(action.action.as_str())
        .bind(action.actor_id)
        .bind(&extra)
        .bind(action.created_at)
        .bind(action.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to save pending action: {}", e)))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<PendingAction>, DomainError> {
        let row = sqlx::query(&format!("{} WHERE key = ?", SELECT_COLUMNS))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get pending action: {}", e)))?;

        match row {
            Some(row) => row_to_action(&row),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM pending_actions WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete pending action: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_chat(&self, chat_id: ChatId) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM pending_actions WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to delete chat pending actions: {}", e))
            })?;

        Ok(result.rows_affected())
    }

    async fn append_confirmation(
        &self,
        key: &str,
        user_id: UserId,
    ) -> Result<Option<Vec<UserId>>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        let extra: Option<Option<String>> =
            sqlx::query_scalar("SELECT extra_json FROM pending_actions WHERE key = ?")
                .bind(key)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to read confirmations: {}", e)))?;

        let Some(extra) = extra else {
            return Ok(None);
        };

        let mut extra = parse_extra(key, extra.as_deref());
        if !extra.confirmations.contains(&user_id) {
            extra.confirmations.push(user_id);
        }

        let json = serde_json::to_string(&extra)
            .map_err(|e| DomainError::internal(format!("Failed to encode action extra: {}", e)))?;

        sqlx::query("UPDATE pending_actions SET extra_json = ? WHERE key = ?")
            .bind(&json)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to save confirmation: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit confirmation: {}", e)))?;

        Ok(Some(extra.confirmations))
    }

    async fn set_message_id(&self, keys: &[String], message_id: i64) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        for key in keys {
            sqlx::query("UPDATE pending_actions SET message_id = ? WHERE key = ?")
                .bind(message_id)
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to set message id: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit message ids: {}", e)))?;

        Ok(())
    }

    async fn delete_expired(&self, now: i64) -> Result<u64, DomainError> {
        let result =
            sqlx::query("DELETE FROM pending_actions WHERE expires_at IS NOT NULL AND expires_at < ?")
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::storage(format!("Failed to delete expired actions: {}", e))
                })?;

        Ok(result.rows_affected())
    }
}

fn parse_extra(key: &str, json: Option<&str>) -> ActionExtra {
    let Some(json) = json.filter(|j| !j.trim().is_empty()) else {
        return ActionExtra::default();
    };

    serde_json::from_str(json).unwrap_or_else(|e| {
        warn!(key, error = %e, "Ignoring unreadable pending action payload");
        ActionExtra::default()
    })
}

fn row_to_action(row: &SqliteRow) -> Result<Option<PendingAction>, DomainError> {
    let get_err = |e: sqlx::Error| DomainError::storage(format!("Failed to read row: {}", e));

    let key: String = row.try_get("key").map_err(get_err)?;
    let action: Option<String> = row.try_get("action").map_err(get_err)?;
    let Some(action) = action.and_then(|a| a.parse::<ActionKind>().ok()) else {
        warn!(key = %key, "Skipping pending action with unknown kind");
        return Ok(None);
    };

    let extra_json: Option<String> = row.try_get("extra_json").map_err(get_err)?;
    let extra = parse_extra(&key, extra_json.as_deref());
    let created_at: Option<i64> = row.try_get("created_at").map_err(get_err)?;
    let expires_at: Option<i64> = row.try_get("expires_at").map_err(get_err)?;

    Ok(Some(PendingAction {
        chat_id: row.try_get::<Option<i64>, _>("chat_id").map_err(get_err)?.unwrap_or_default(),
        message_id: row
            .try_get::<Option<i64>, _>("message_id")
            .map_err(get_err)?
            .unwrap_or_default(),
        action,
        actor_id: row.try_get("actor_id").map_err(get_err)?,
        target: extra.target,
        confirmations: extra.confirmations,
        created_at: created_at.unwrap_or_default(),
        expires_at: expires_at.unwrap_or(i64::MAX),
        key,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::{connect_in_memory, run_storage_migrations};

    async fn create_repo() -> SqlitePendingActionRepository {
        let pool = connect_in_memory().await.unwrap();
        run_storage_migrations(&pool).await.unwrap();
        SqlitePendingActionRepository::new(pool)
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = create_repo().await;
        let action = PendingAction::new(-1, ActionKind::Heal, Some(3), Some(4), 60);

        repo.upsert(&action).await.unwrap();
        let loaded = repo.get(&action.key).await.unwrap().unwrap();

        assert_eq!(loaded, action);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_confirmation_is_idempotent() {
        let repo = create_repo().await;
        let action = PendingAction::new(-1, ActionKind::MafiaConfirm, None, Some(4), 60);
        repo.upsert(&action).await.unwrap();

        repo.append_confirmation(&action.key, 1).await.unwrap();
        repo.append_confirmation(&action.key, 1).await.unwrap();
        let confirmations = repo.append_confirmation(&action.key, 2).await.unwrap();

        assert_eq!(confirmations, Some(vec![1, 2]));
        assert_eq!(repo.append_confirmation("gone", 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_message_id() {
        let repo = create_repo().await;
        let a = PendingAction::new(-1, ActionKind::Block, Some(1), Some(2), 60);
        let b = PendingAction::new(-1, ActionKind::Block, Some(1), Some(3), 60);
        repo.upsert(&a).await.unwrap();
        repo.upsert(&b).await.unwrap();

        repo.set_message_id(&[a.key.clone(), b.key.clone()], 77)
            .await
            .unwrap();

        assert_eq!(repo.get(&a.key).await.unwrap().unwrap().message_id, 77);
        assert_eq!(repo.get(&b.key).await.unwrap().unwrap().message_id, 77);
    }

    #[tokio::test]
    async fn test_delete_expired_and_for_chat() {
        let repo = create_repo().await;
        let old =
            PendingAction::new(-1, ActionKind::Heal, Some(1), Some(2), 60).with_expires_at(100);
        let fresh =
            PendingAction::new(-1, ActionKind::Heal, Some(1), Some(3), 60).with_expires_at(500);
        let other = PendingAction::new(-2, ActionKind::VoteGroup, None, Some(3), 60);
        for action in [&old, &fresh, &other] {
            repo.upsert(action).await.unwrap();
        }

        assert_eq!(repo.delete_expired(200).await.unwrap(), 1);
        assert_eq!(repo.delete_for_chat(-1).await.unwrap(), 1);
        assert!(repo.get(&other.key).await.unwrap().is_some());
        assert!(repo.delete(&other.key).await.unwrap());
        assert!(!repo.delete(&other.key).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_extra_loads_default() {
        let repo = create_repo().await;
        sqlx::query(
            "INSERT INTO pending_actions (key, chat_id, message_id, action, actor_id, extra_json, created_at, expires_at)
             VALUES ('k', -1, 5, 'heal', 3, '{broken', 1, 2)",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let action = repo.get("k").await.unwrap().unwrap();

        assert_eq!(action.action, ActionKind::Heal);
        assert!(action.target.is_none());
        assert!(action.confirmations.is_empty());
    }
}
