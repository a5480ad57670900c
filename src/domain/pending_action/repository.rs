use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::entity::PendingAction;
use crate::domain::game::{ChatId, UserId};
use crate::domain::DomainError;

/// Repository for button presses awaiting a user
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PendingActionRepository: Send + Sync + std::fmt::Debug {
    async fn upsert(&self, action: &PendingAction) -> Result<(), DomainError>;

    async fn get(&self, key: &str) -> Result<Option<PendingAction>, DomainError>;

    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Remove every pending action of a chat, returning how many were removed
    async fn delete_for_chat(&self, chat_id: ChatId) -> Result<u64, DomainError>;

    /// Add a confirmation once per user; `None` when the action is gone
    async fn append_confirmation(
        &self,
        key: &str,
        user_id: UserId,
    ) -> Result<Option<Vec<UserId>>, DomainError>;

    async fn set_message_id(&self, keys: &[String], message_id: i64) -> Result<(), DomainError>;

    /// Remove actions that expired before `now`
    async fn delete_expired(&self, now: i64) -> Result<u64, DomainError>;
}
