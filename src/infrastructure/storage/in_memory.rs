//! In-memory repository implementations

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::game::{ChatId, Game, GameRepository, UserId};
use crate::domain::pending_action::{PendingAction, PendingActionRepository};
use crate::domain::DomainError;

fn lock_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::storage(format!("Failed to acquire lock: {}", e))
}

/// Thread-safe in-memory game repository
///
/// Useful for testing and for running the dashboard without a database file.
/// Data is lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryGameRepository {
    games: RwLock<HashMap<ChatId, Game>>,
    /// Mirrors the cascade the SQLite repository performs on delete
    pending: Option<std::sync::Arc<InMemoryPendingActionRepository>>,
}

impl InMemoryGameRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete pending actions of this store when a game is deleted
    pub fn with_pending_actions(pending: std::sync::Arc<InMemoryPendingActionRepository>) -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            pending: Some(pending),
        }
    }

    pub fn with_games(games: Vec<Game>) -> Self {
        let repo = Self::new();
        if let Ok(mut map) = repo.games.write() {
            for game in games {
                map.insert(game.chat_id, game);
            }
        }
        repo
    }
}

#[async_trait]
impl GameRepository for InMemoryGameRepository {
    async fn find(&self, chat_id: ChatId) -> Result<Option<Game>, DomainError> {
        let games = self.games.read().map_err(lock_error)?;
        Ok(games.get(&chat_id).cloned())
    }

    async fn list_ids(&self) -> Result<Vec<ChatId>, DomainError> {
        let games = self.games.read().map_err(lock_error)?;
        let mut ids: Vec<ChatId> = games.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn save(&self, game: &Game) -> Result<(), DomainError> {
        let mut games = self.games.write().map_err(lock_error)?;
        games.insert(game.chat_id, game.clone());
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId) -> Result<bool, DomainError> {
        let removed = {
            let mut games = self.games.write().map_err(lock_error)?;
            games.remove(&chat_id).is_some()
        };

        if let Some(pending) = &self.pending {
            pending.delete_for_chat(chat_id).await?;
        }

        Ok(removed)
    }
}

/// Thread-safe in-memory pending action repository
#[derive(Debug, Default)]
pub struct InMemoryPendingActionRepository {
    actions: RwLock<HashMap<String, PendingAction>>,
}

impl InMemoryPendingActionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actions.read().map(|a| a.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored action of a chat, oldest first
    pub fn for_chat(&self, chat_id: ChatId) -> Vec<PendingAction> {
        let mut actions: Vec<PendingAction> = self
            .actions
            .read()
            .map(|a| a.values().filter(|p| p.chat_id == chat_id).cloned().collect())
            .unwrap_or_default();
        actions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
        actions
    }
}

#[async_trait]
impl PendingActionRepository for InMemoryPendingActionRepository {
    async fn upsert(&self, action: &PendingAction) -> Result<(), DomainError> {
        let mut actions = self.actions.write().map_err(lock_error)?;
        actions.insert(action.key.clone(), action.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<PendingAction>, DomainError> {
        let actions = self.actions.read().map_err(lock_error)?;
        Ok(actions.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let mut actions = self.actions.write().map_err(lock_error)?;
        Ok(actions.remove(key).is_some())
    }

    async fn delete_for_chat(&self, chat_id: ChatId) -> Result<u64, DomainError> {
        let mut actions = self.actions.write().map_err(lock_error)?;
        let before = actions.len();
        actions.retain(|_, a| a.chat_id != chat_id);
        Ok((before - actions.len()) as u64)
    }

    async fn append_confirmation(
        &self,
        key: &str,
        user_id: UserId,
    ) -> Result<Option<Vec<UserId>>, DomainError> {
        let mut actions = self.actions.write().map_err(lock_error)?;
        let Some(action) = actions.get_mut(key) else {
            return Ok(None);
        };

        if !action.confirmations.contains(&user_id) {
            action.confirmations.push(user_id);
        }

        Ok(Some(action.confirmations.clone()))
    }

    async fn set_message_id(&self, keys: &[String], message_id: i64) -> Result<(), DomainError> {
        let mut actions = self.actions.write().map_err(lock_error)?;
        for key in keys {
            if let Some(action) = actions.get_mut(key) {
                action.message_id = message_id;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self, now: i64) -> Result<u64, DomainError> {
        let mut actions = self.actions.write().map_err(lock_error)?;
        let before = actions.len();
        actions.retain(|_, a| a.expires_at >= now);
        Ok((before - actions.len()) as u64)
    }
}
