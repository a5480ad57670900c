//! Pending action service - lifecycle of inline-keyboard presses

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::game::unix_now;
use crate::domain::pending_action::{ActionKind, PendingAction, PendingActionRepository};
use crate::domain::{ChatId, DomainError, UserId};

/// Result of looking up a button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Missing,
    /// Found but past its expiry; already deleted
    Expired,
    Found(PendingAction),
}

#[derive(Debug)]
pub struct PendingActionService {
    repository: Arc<dyn PendingActionRepository>,
    default_ttl_secs: i64,
}

impl PendingActionService {
    pub fn new(repository: Arc<dyn PendingActionRepository>, default_ttl_secs: i64) -> Self {
        Self {
            repository,
            default_ttl_secs,
        }
    }

    /// Persist a new action; `expires_at` defaults to now plus the configured TTL
    pub async fn create(
        &self,
        chat_id: ChatId,
        action: ActionKind,
        actor_id: Option<UserId>,
        target: Option<UserId>,
        expires_at: Option<i64>,
    ) -> Result<PendingAction, DomainError> {
        let mut pending =
            PendingAction::new(chat_id, action, actor_id, target, self.default_ttl_secs);
        if let Some(expires_at) = expires_at {
            pending = pending.with_expires_at(expires_at);
        }

        self.repository.upsert(&pending).await?;
        debug!(chat_id, key = %pending.key, action = %action, "Pending action created");

        Ok(pending)
    }

    pub async fn lookup(&self, key: &str, now: i64) -> Result<Lookup, DomainError> {
        let Some(action) = self.repository.get(key).await? else {
            return Ok(Lookup::Missing);
        };

        if action.is_expired(now) {
            self.repository.delete(key).await?;
            debug!(key, "Expired pending action removed on lookup");
            return Ok(Lookup::Expired);
        }

        Ok(Lookup::Found(action))
    }

    /// Record a confirmation; `None` when the action is gone
    pub async fn confirm(
        &self,
        key: &str,
        user_id: UserId,
    ) -> Result<Option<Vec<UserId>>, DomainError> {
        self.repository.append_confirmation(key, user_id).await
    }

    pub async fn set_message_id(
        &self,
        keys: &[String],
        message_id: i64,
    ) -> Result<(), DomainError> {
        if keys.is_empty() {
            return Ok(());
        }
        self.repository.set_message_id(keys, message_id).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<PendingAction>, DomainError> {
        self.repository.get(key).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        self.repository.delete(key).await
    }

    pub async fn purge_chat(&self, chat_id: ChatId) -> Result<u64, DomainError> {
        let removed = self.repository.delete_for_chat(chat_id).await?;
        if removed > 0 {
            debug!(chat_id, removed, "Pending actions purged");
        }
        Ok(removed)
    }

    pub async fn sweep_expired(&self) -> Result<u64, DomainError> {
        let removed = self.repository.delete_expired(unix_now()).await?;
        if removed > 0 {
            info!(removed, "Expired pending actions swept");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pending_action::MockPendingActionRepository;
    use crate::infrastructure::storage::InMemoryPendingActionRepository;
    use mockall::predicate::eq;

    fn service() -> (PendingActionService, Arc<InMemoryPendingActionRepository>) {
        let repo = Arc::new(InMemoryPendingActionRepository::new());
        (PendingActionService::new(repo.clone(), 3600), repo)
    }

    #[tokio::test]
    async fn test_create_uses_default_ttl() {
        let (service, _) = service();

        let action = service
            .create(-1, ActionKind::Heal, Some(1), Some(2), None)
            .await
            .unwrap();

        assert_eq!(action.expires_at - action.created_at, 3600);
        assert_eq!(
            service.lookup(&action.key, action.created_at).await.unwrap(),
            Lookup::Found(action)
        );
    }

    #[tokio::test]
    async fn test_lookup_deletes_expired() {
        let (service, repo) = service();
        let action = service
            .create(-1, ActionKind::VoteGroup, None, Some(2), Some(100))
            .await
            .unwrap();

        assert_eq!(service.lookup(&action.key, 101).await.unwrap(), Lookup::Expired);
        assert!(repo.is_empty());
        assert_eq!(service.lookup(&action.key, 101).await.unwrap(), Lookup::Missing);
    }

    #[tokio::test]
    async fn test_set_message_id_skips_empty_batches() {
        let mut repo = MockPendingActionRepository::new();
        repo.expect_set_message_id().times(0);
        let service = PendingActionService::new(Arc::new(repo), 60);

        service.set_message_id(&[], 5).await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_chat_delegates() {
        let mut repo = MockPendingActionRepository::new();
        repo.expect_delete_for_chat()
            .with(eq(-7))
            .times(1)
            .returning(|_| Ok(3));
        let service = PendingActionService::new(Arc::new(repo), 60);

        assert_eq!(service.purge_chat(-7).await.unwrap(), 3);
    }
}
