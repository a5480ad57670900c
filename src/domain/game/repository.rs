//! Game repository trait

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::entity::{ChatId, Game};
use crate::domain::DomainError;

/// Repository for game persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GameRepository: Send + Sync + std::fmt::Debug {
    /// Load a game with its players
    async fn find(&self, chat_id: ChatId) -> Result<Option<Game>, DomainError>;

    /// Chat ids of every stored game
    async fn list_ids(&self) -> Result<Vec<ChatId>, DomainError>;

    /// Insert or update a game, replacing its player rows
    async fn save(&self, game: &Game) -> Result<(), DomainError>;

    /// Delete a game, its players and its pending actions
    async fn delete(&self, chat_id: ChatId) -> Result<bool, DomainError>;
}
