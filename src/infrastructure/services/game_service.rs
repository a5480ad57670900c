//! Game manager - in-memory game cache backed by the game repository

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::domain::game::{
    clamp_phase_seconds, ChatId, Game, GameRepository, Phase, Player, UserId,
    DEFAULT_DAY_SECONDS, DEFAULT_NIGHT_SECONDS, DEFAULT_REMINDER_SECONDS,
};
use crate::domain::DomainError;

/// A game shared between handlers; its mutex serializes every mutation
pub type SharedGame = Arc<Mutex<Game>>;

/// Outcome of `/resyncpartida`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    AlreadyLoaded(Phase),
    Loaded(Phase),
    Missing,
}

/// Phase durations given to newly created games
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameDefaults {
    pub night_seconds: i64,
    pub day_seconds: i64,
    pub reminder_seconds: i64,
}

impl Default for GameDefaults {
    fn default() -> Self {
        Self {
            night_seconds: DEFAULT_NIGHT_SECONDS,
            day_seconds: DEFAULT_DAY_SECONDS,
            reminder_seconds: DEFAULT_REMINDER_SECONDS,
        }
    }
}

#[derive(Debug)]
pub struct GameManager {
    repository: Arc<dyn GameRepository>,
    games: RwLock<HashMap<ChatId, SharedGame>>,
    defaults: GameDefaults,
}

impl GameManager {
    pub fn new(repository: Arc<dyn GameRepository>) -> Self {
        Self {
            repository,
            games: RwLock::new(HashMap::new()),
            defaults: GameDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: GameDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Load every stored game into memory
    pub async fn load_all(&self) -> Result<usize, DomainError> {
        let ids = self.repository.list_ids().await?;
        let mut loaded = 0;

        for chat_id in ids {
            match self.repository.find(chat_id).await? {
                Some(game) => {
                    self.insert_if_absent(game).await;
                    loaded += 1;
                }
                None => warn!(chat_id, "Game vanished while loading"),
            }
        }

        info!(games = loaded, "Games loaded from storage");
        Ok(loaded)
    }

    async fn insert_if_absent(&self, game: Game) -> SharedGame {
        let mut games = self.games.write().await;
        Arc::clone(
            games
                .entry(game.chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(game))),
        )
    }

    async fn cached(&self, chat_id: ChatId) -> Option<SharedGame> {
        self.games.read().await.get(&chat_id).cloned()
    }

    /// Game from memory, hydrated from storage when only stored there
    pub async fn get(&self, chat_id: ChatId) -> Result<Option<SharedGame>, DomainError> {
        if let Some(game) = self.cached(chat_id).await {
            return Ok(Some(game));
        }

        match self.repository.find(chat_id).await? {
            Some(game) => {
                info!(chat_id, "Game hydrated from storage");
                Ok(Some(self.insert_if_absent(game).await))
            }
            None => Ok(None),
        }
    }

    /// Look a game up by id, then by the id with its sign flipped
    ///
    /// Dashboard URLs carry `abs(chat_id)` while group ids are negative.
    pub async fn get_either_sign(
        &self,
        chat_id: ChatId,
    ) -> Result<Option<(ChatId, SharedGame)>, DomainError> {
        if let Some(game) = self.get(chat_id).await? {
            return Ok(Some((chat_id, game)));
        }

        let flipped = chat_id.checked_neg().unwrap_or(chat_id);
        if flipped != chat_id {
            if let Some(game) = self.get(flipped).await? {
                return Ok(Some((flipped, game)));
            }
        }

        Ok(None)
    }

    /// Create a lobby in a chat that has no game yet
    pub async fn create(
        &self,
        chat_id: ChatId,
        host_id: UserId,
    ) -> Result<SharedGame, DomainError> {
        if self.cached(chat_id).await.is_some() {
            return Err(DomainError::conflict(format!("Game {} already exists", chat_id)));
        }

        if let Some(existing) = self.repository.find(chat_id).await? {
            self.insert_if_absent(existing).await;
            return Err(DomainError::conflict(format!(
                "Game {} already exists in storage",
                chat_id
            )));
        }

        let mut game = Game::new(chat_id, host_id);
        game.night_seconds = clamp_phase_seconds(self.defaults.night_seconds);
        game.day_seconds = clamp_phase_seconds(self.defaults.day_seconds);
        game.periodic_reminder_seconds = self.defaults.reminder_seconds.max(1);

        let mut games = self.games.write().await;
        if games.contains_key(&chat_id) {
            return Err(DomainError::conflict(format!("Game {} already exists", chat_id)));
        }
        self.repository.save(&game).await?;
        let shared = Arc::new(Mutex::new(game));
        games.insert(chat_id, Arc::clone(&shared));

        info!(chat_id, host_id, "Game created");
        Ok(shared)
    }

    /// Remove a game from memory and storage
    pub async fn remove(&self, chat_id: ChatId) -> Result<bool, DomainError> {
        let in_memory = self.games.write().await.remove(&chat_id).is_some();
        let in_storage = self.repository.delete(chat_id).await?;

        info!(chat_id, "Game removed");
        Ok(in_memory || in_storage)
    }

    async fn require(&self, chat_id: ChatId) -> Result<SharedGame, DomainError> {
        self.get(chat_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("No game in chat {}", chat_id)))
    }

    pub async fn add_player(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        name: &str,
    ) -> Result<(), DomainError> {
        let shared = self.require(chat_id).await?;
        let mut game = shared.lock().await;

        game.add_player(user_id, name)?;
        self.persist(&game).await?;

        info!(chat_id, user_id, players = game.players.len(), "Player joined");
        Ok(())
    }

    pub async fn remove_player(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<Player, DomainError> {
        let shared = self.require(chat_id).await?;
        let mut game = shared.lock().await;

        let player = game.remove_player(user_id)?;
        self.persist(&game).await?;

        info!(chat_id, user_id, "Player left");
        Ok(player)
    }

    /// Save a game; callers hold its lock
    ///
    /// A game no longer in memory has been deleted and is not written back.
    pub async fn persist(&self, game: &Game) -> Result<(), DomainError> {
        if self.cached(game.chat_id).await.is_none() {
            warn!(chat_id = game.chat_id, "Refusing to save a removed game");
            return Err(DomainError::not_found(format!(
                "No game in chat {}",
                game.chat_id
            )));
        }
        self.repository.save(game).await
    }

    /// Load stored games missing from memory, returning their ids
    pub async fn resync_from_db(&self) -> Result<Vec<ChatId>, DomainError> {
        let mut loaded = Vec::new();

        for chat_id in self.repository.list_ids().await? {
            if self.cached(chat_id).await.is_some() {
                continue;
            }
            if let Some(game) = self.repository.find(chat_id).await? {
                self.insert_if_absent(game).await;
                loaded.push(chat_id);
            }
        }

        if !loaded.is_empty() {
            info!(count = loaded.len(), "Games resynced from storage");
        }
        Ok(loaded)
    }

    pub async fn reload(&self, chat_id: ChatId) -> Result<ReloadOutcome, DomainError> {
        if let Some(shared) = self.cached(chat_id).await {
            let phase = shared.lock().await.phase;
            return Ok(ReloadOutcome::AlreadyLoaded(phase));
        }

        match self.repository.find(chat_id).await? {
            Some(game) => {
                let phase = game.phase;
                self.insert_if_absent(game).await;
                Ok(ReloadOutcome::Loaded(phase))
            }
            None => Ok(ReloadOutcome::Missing),
        }
    }

    /// Copies of every game in memory, ordered by chat id
    pub async fn snapshot(&self) -> Vec<Game> {
        let shared: Vec<SharedGame> = self.games.read().await.values().cloned().collect();

        let mut games = Vec::with_capacity(shared.len());
        for game in shared {
            games.push(game.lock().await.clone());
        }
        games.sort_by_key(|g| g.chat_id);
        games
    }

    pub async fn ids(&self) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self.games.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Storage reachability, used by the readiness probe
    pub async fn check_storage(&self) -> Result<(), DomainError> {
        self.repository.list_ids().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game::MockGameRepository;
    use crate::infrastructure::storage::InMemoryGameRepository;

    fn manager_with(repo: Arc<InMemoryGameRepository>) -> GameManager {
        GameManager::new(repo)
    }

    #[tokio::test]
    async fn test_create_and_join() {
        let repo = Arc::new(InMemoryGameRepository::new());
        let manager = manager_with(repo.clone());

        manager.create(-100, 1).await.unwrap();
        manager.add_player(-100, 1, "Ana").await.unwrap();

        let stored = repo.find(-100).await.unwrap().unwrap();
        assert_eq!(stored.host_id, 1);
        assert!(stored.players.contains_key(&1));
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let manager = manager_with(Arc::new(InMemoryGameRepository::new())).with_defaults(
            GameDefaults {
                night_seconds: 10,
                day_seconds: 900,
                reminder_seconds: 60,
            },
        );

        let shared = manager.create(-1, 1).await.unwrap();
        let game = shared.lock().await;

        assert_eq!(game.night_seconds, 120);
        assert_eq!(game.day_seconds, 900);
        assert_eq!(game.periodic_reminder_seconds, 60);
    }

    #[tokio::test]
    async fn test_create_conflicts_with_stored_game() {
        let repo = Arc::new(InMemoryGameRepository::with_games(vec![Game::new(-100, 9)]));
        let manager = manager_with(repo);

        let err = manager.create(-100, 1).await.unwrap_err();

        assert!(matches!(err, DomainError::Conflict { .. }));
        assert_eq!(manager.ids().await, vec![-100]);
    }

    #[tokio::test]
    async fn test_losing_create_keeps_stored_lobby() {
        let repo = Arc::new(InMemoryGameRepository::new());
        let manager = manager_with(repo.clone());
        manager.create(-100, 1).await.unwrap();
        manager.add_player(-100, 1, "Ana").await.unwrap();

        let err = manager.create(-100, 2).await.unwrap_err();

        assert!(matches!(err, DomainError::Conflict { .. }));
        let stored = repo.find(-100).await.unwrap().unwrap();
        assert_eq!(stored.host_id, 1);
        assert!(stored.players.contains_key(&1));
    }

    #[tokio::test]
    async fn test_create_race_has_one_winner() {
        let repo = Arc::new(InMemoryGameRepository::new());
        let manager = Arc::new(manager_with(repo.clone()));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.create(-100, 1).await.is_ok() }
        });
        let second = tokio::spawn({
            let manager = manager.clone();
            async move { manager.create(-100, 2).await.is_ok() }
        });
        let (first, second) = (first.await.unwrap(), second.await.unwrap());

        assert!(first ^ second);
        let winner = if first { 1 } else { 2 };
        assert_eq!(repo.find(-100).await.unwrap().unwrap().host_id, winner);
    }

    #[tokio::test]
    async fn test_removed_game_is_not_written_back() {
        let repo = Arc::new(InMemoryGameRepository::new());
        let manager = manager_with(repo.clone());
        let shared = manager.create(-5, 1).await.unwrap();
        let stale = shared.lock().await.clone();

        manager.remove(-5).await.unwrap();
        let err = manager.persist(&stale).await.unwrap_err();

        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(repo.find(-5).await.unwrap().is_none());
        assert!(manager.get(-5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_join_without_game() {
        let manager = manager_with(Arc::new(InMemoryGameRepository::new()));

        let err = manager.add_player(-1, 1, "Ana").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_either_sign() {
        let repo = Arc::new(InMemoryGameRepository::with_games(vec![Game::new(-4242, 1)]));
        let manager = manager_with(repo);

        let (used, _) = manager.get_either_sign(4242).await.unwrap().unwrap();
        assert_eq!(used, -4242);
        assert!(manager.get_either_sign(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resync_and_reload() {
        let repo = Arc::new(InMemoryGameRepository::with_games(vec![
            Game::new(-1, 1),
            Game::new(-2, 1),
        ]));
        let manager = manager_with(repo.clone());

        assert_eq!(manager.reload(-1).await.unwrap(), ReloadOutcome::Loaded(Phase::Lobby));
        assert_eq!(
            manager.reload(-1).await.unwrap(),
            ReloadOutcome::AlreadyLoaded(Phase::Lobby)
        );
        assert_eq!(manager.resync_from_db().await.unwrap(), vec![-2]);
        assert_eq!(manager.reload(-3).await.unwrap(), ReloadOutcome::Missing);
    }

    #[tokio::test]
    async fn test_remove_deletes_from_storage() {
        let repo = Arc::new(InMemoryGameRepository::new());
        let manager = manager_with(repo.clone());
        manager.create(-5, 1).await.unwrap();

        assert!(manager.remove(-5).await.unwrap());
        assert!(repo.find(-5).await.unwrap().is_none());
        assert!(manager.get(-5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let mut repo = MockGameRepository::new();
        repo.expect_find()
            .returning(|_| Err(DomainError::storage("disk on fire")));
        let manager = GameManager::new(Arc::new(repo));

        let err = manager.get(-1).await.unwrap_err();
        assert!(matches!(err, DomainError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_snapshot_is_sorted() {
        let repo = Arc::new(InMemoryGameRepository::with_games(vec![
            Game::new(-1, 1),
            Game::new(-9, 1),
        ]));
        let manager = manager_with(repo);
        manager.load_all().await.unwrap();

        let ids: Vec<ChatId> = manager.snapshot().await.iter().map(|g| g.chat_id).collect();
        assert_eq!(ids, vec![-9, -1]);
    }
}
