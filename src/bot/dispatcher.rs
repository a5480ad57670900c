//! Update dispatch: rate limiting, command routing and button presses

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::commands::Command;
use super::messages;
use crate::domain::{ChatId, DomainError, Messenger, Phase, TextFormat};
use crate::infrastructure::rate_limiter::{rate_limit_key, RateLimiter};
use crate::infrastructure::services::{CallbackOutcome, GameEngine, ReloadOutcome, StartOutcome};
use crate::infrastructure::telegram::{CallbackQuery, Chat, Message, Update, UpdateHandler, User};

#[derive(Debug)]
pub struct Dispatcher {
    engine: Arc<GameEngine>,
    messenger: Arc<dyn Messenger>,
    rate_limiter: Arc<RateLimiter>,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<GameEngine>,
        messenger: Arc<dyn Messenger>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            engine,
            messenger,
            rate_limiter,
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self
            .messenger
            .send_message(chat_id, text, TextFormat::Plain, None)
            .await
        {
            warn!(chat_id, error = %e, "Failed to reply");
        }
    }

    async fn allowed(&self, chat_id: Option<ChatId>, user_id: i64) -> bool {
        let key = rate_limit_key(chat_id, Some(user_id));
        let result = self.rate_limiter.check_and_record(&key).await;
        if !result.allowed {
            info!(key = %key, reset_in = result.reset_in_seconds, "Rate limit hit");
        }
        result.allowed
    }

    pub async fn handle_message(&self, message: &Message) {
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return;
        };
        let Some(user) = &message.from else {
            return;
        };
        let chat_id = message.chat.id;

        if !self.allowed(Some(chat_id), user.id).await {
            self.reply(chat_id, messages::RATE_LIMITED).await;
            return;
        }

        debug!(chat_id, user_id = user.id, command = %command, "Command received");
        match self.run_command(command, &message.chat, user).await {
            Ok(Some(text)) => self.reply(chat_id, &text).await,
            Ok(None) => {}
            Err(e) => {
                error!(
                    chat_id,
                    user_id = user.id,
                    command = %command,
                    error = %e,
                    "Command failed"
                );
                self.reply(chat_id, messages::INTERNAL_ERROR).await;
            }
        }
    }

    /// Run a command, returning the reply for the group
    async fn run_command(
        &self,
        command: Command,
        chat: &Chat,
        user: &User,
    ) -> Result<Option<String>, DomainError> {
        let chat_id = chat.id;
        let games = self.engine.games();

        let reply = match command {
            Command::Help => messages::HELP.to_string(),
            Command::CreateGame => {
                if chat.is_private() {
                    return Ok(Some(messages::CREATE_IN_GROUP.to_string()));
                }
                match games.create(chat_id, user.id).await {
                    Ok(_) => messages::game_created(&user.display_name()),
                    Err(DomainError::Conflict { .. }) => messages::GAME_EXISTS.to_string(),
                    Err(e) => return Err(e),
                }
            }
            Command::Join => {
                if games.get(chat_id).await?.is_none() {
                    return Ok(Some(messages::NO_GAME_CREATE_HINT.to_string()));
                }
                let name = user.display_name();
                match games.add_player(chat_id, user.id, &name).await {
                    Ok(()) => messages::joined(&name),
                    Err(DomainError::Conflict { .. }) => messages::ALREADY_JOINED.to_string(),
                    Err(DomainError::Validation { .. }) => messages::JOIN_CLOSED.to_string(),
                    Err(e) => return Err(e),
                }
            }
            Command::Leave => {
                let Some(shared) = games.get(chat_id).await? else {
                    return Ok(Some(messages::NO_GAME.to_string()));
                };
                if shared.lock().await.phase != Phase::Lobby {
                    return Ok(Some(messages::CANNOT_LEAVE.to_string()));
                }
                match games.remove_player(chat_id, user.id).await {
                    Ok(_) => messages::LEFT.to_string(),
                    Err(DomainError::NotFound { .. }) => messages::NOT_IN_GAME.to_string(),
                    Err(DomainError::Validation { .. }) => messages::CANNOT_LEAVE.to_string(),
                    Err(e) => return Err(e),
                }
            }
            Command::Status => match games.get(chat_id).await? {
                Some(shared) => messages::status(&*shared.lock().await),
                None => messages::NO_GAME_HERE.to_string(),
            },
            Command::Start => match self.engine.start_game(chat_id, user.id).await? {
                StartOutcome::Started => return Ok(None),
                StartOutcome::NoGame => messages::NO_GAME_HERE.to_string(),
                StartOutcome::AlreadyStarted => messages::ALREADY_STARTED.to_string(),
                StartOutcome::NotEnoughPlayers { needed } => messages::need_players(needed),
            },
            Command::Resync => match games.reload(chat_id).await? {
                ReloadOutcome::AlreadyLoaded(phase) => messages::already_loaded(phase),
                ReloadOutcome::Loaded(phase) => {
                    if let Some(shared) = games.get(chat_id).await? {
                        let game = shared.lock().await.clone();
                        self.engine.reschedule_game(&game);
                    }
                    info!(chat_id, phase = %phase, "Game rehydrated on request");
                    messages::rehydrated(phase)
                }
                ReloadOutcome::Missing => messages::NOTHING_IN_DB.to_string(),
            },
            Command::Delete => {
                if !self.may_delete(chat_id, user.id).await? {
                    return Ok(Some(messages::DELETE_FORBIDDEN.to_string()));
                }
                self.engine.delete_game(chat_id).await?;
                info!(chat_id, user_id = user.id, "Game deleted on request");
                messages::DELETED.to_string()
            }
        };

        Ok(Some(reply))
    }

    /// Group admins and the game host may delete; a failed lookup lets it through
    async fn may_delete(&self, chat_id: ChatId, user_id: i64) -> Result<bool, DomainError> {
        let is_host = match self.engine.games().get(chat_id).await? {
            Some(shared) => shared.lock().await.host_id == user_id,
            None => false,
        };
        if is_host {
            return Ok(true);
        }

        match self.messenger.chat_member_status(chat_id, user_id).await {
            Ok(status) => Ok(status.is_admin()),
            Err(e) => {
                warn!(chat_id, user_id, error = %e, "Membership lookup failed, allowing delete");
                Ok(true)
            }
        }
    }

    pub async fn handle_callback_query(&self, query: &CallbackQuery) {
        let user_id = query.from.id;
        let chat_id = query.message.as_ref().map(|m| m.chat.id);

        if !self.allowed(chat_id, user_id).await {
            self.answer(&query.id, Some(messages::RATE_LIMITED), false)
                .await;
            return;
        }

        let data = query.data.as_deref().unwrap_or_default();
        let outcome = match self.engine.handle_callback(user_id, data).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(user_id, error = %e, "Callback handling failed");
                self.answer(&query.id, Some(messages::INTERNAL_ERROR), true)
                    .await;
                return;
            }
        };

        self.apply_outcome(query, outcome).await;
    }

    async fn apply_outcome(&self, query: &CallbackQuery, outcome: CallbackOutcome) {
        if let Some(alert) = &outcome.alert {
            self.answer(&query.id, Some(alert), true).await;
        } else {
            self.answer(&query.id, None, false).await;
        }

        let (Some(text), Some(message)) = (&outcome.edit, &query.message) else {
            return;
        };
        if let Err(e) = self
            .messenger
            .edit_message(message.chat.id, message.message_id, text)
            .await
        {
            warn!(chat_id = message.chat.id, error = %e, "Failed to edit message");
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>, show_alert: bool) {
        if let Err(e) = self
            .messenger
            .answer_callback(callback_id, text, show_alert)
            .await
        {
            debug!(error = %e, "Failed to answer callback query");
        }
    }
}

#[async_trait]
impl UpdateHandler for Dispatcher {
    async fn handle(&self, update: Update) {
        if let Some(message) = &update.message {
            self.handle_message(message).await;
        } else if let Some(query) = &update.callback_query {
            self.handle_callback_query(query).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messenger::mock::RecordingMessenger;
    use crate::domain::{ActionKind, MemberStatus, PendingAction, PendingActionRepository};
    use crate::infrastructure::scheduler::JobScheduler;
    use crate::infrastructure::services::{EngineSettings, GameManager, PendingActionService};
    use crate::infrastructure::storage::{InMemoryGameRepository, InMemoryPendingActionRepository};
    use serde_json::json;
    use std::time::Duration;

    const GROUP: ChatId = -100;

    fn fixture(
        calls: u32,
    ) -> (Dispatcher, Arc<RecordingMessenger>, Arc<InMemoryPendingActionRepository>) {
        let pending = Arc::new(InMemoryPendingActionRepository::new());
        let repo = Arc::new(InMemoryGameRepository::with_pending_actions(pending.clone()));
        let messenger = Arc::new(RecordingMessenger::new());
        let engine = Arc::new(GameEngine::new(
            Arc::new(GameManager::new(repo)),
            Arc::new(PendingActionService::new(pending.clone(), 3600)),
            messenger.clone(),
            Arc::new(JobScheduler::new()),
            EngineSettings::default(),
        ));

        let dispatcher = Dispatcher::new(
            engine,
            messenger.clone(),
            Arc::new(RateLimiter::new(calls, Duration::from_secs(10))),
        );
        (dispatcher, messenger, pending)
    }

    fn dispatcher_with_limit(calls: u32) -> (Dispatcher, Arc<RecordingMessenger>) {
        let (dispatcher, messenger, _) = fixture(calls);
        (dispatcher, messenger)
    }

    fn dispatcher() -> (Dispatcher, Arc<RecordingMessenger>) {
        dispatcher_with_limit(100)
    }

    fn command(chat_id: ChatId, kind: &str, user_id: i64, name: &str, text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "from": {"id": user_id, "is_bot": false, "first_name": name},
                "chat": {"id": chat_id, "type": kind},
                "date": 0,
                "text": text
            }
        }))
        .unwrap()
    }

    fn group_command(user_id: i64, text: &str) -> Update {
        command(GROUP, "group", user_id, &format!("P{}", user_id), text)
    }

    fn press(user_id: i64, chat_id: ChatId, data: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb1",
                "from": {"id": user_id, "is_bot": false, "first_name": "X"},
                "message": {
                    "message_id": 55,
                    "chat": {"id": chat_id, "type": "private"},
                    "date": 0
                },
                "data": data
            }
        }))
        .unwrap()
    }

    fn last_reply(messenger: &RecordingMessenger) -> String {
        messenger.texts_to(GROUP).pop().unwrap()
    }

    #[tokio::test]
    async fn test_create_join_leave_flow() {
        let (dispatcher, messenger) = dispatcher();

        dispatcher.handle(group_command(1, "/crearpartida")).await;
        assert_eq!(last_reply(&messenger), "Partida creada por P1. Usa /unirme para entrar.");

        dispatcher.handle(group_command(1, "/crearpartida@MafiaBot")).await;
        assert_eq!(last_reply(&messenger), messages::GAME_EXISTS);

        dispatcher.handle(group_command(2, "/unirme")).await;
        assert_eq!(last_reply(&messenger), "P2 se ha unido a la partida.");
        dispatcher.handle(group_command(2, "/unirme")).await;
        assert_eq!(last_reply(&messenger), messages::ALREADY_JOINED);

        dispatcher.handle(group_command(2, "/salirme")).await;
        assert_eq!(last_reply(&messenger), messages::LEFT);
        dispatcher.handle(group_command(2, "/salirme")).await;
        assert_eq!(last_reply(&messenger), messages::NOT_IN_GAME);
    }

    #[tokio::test]
    async fn test_create_refused_in_private_chat() {
        let (dispatcher, messenger) = dispatcher();

        dispatcher
            .handle(command(7, "private", 7, "Ana", "/crearpartida"))
            .await;

        assert_eq!(messenger.texts_to(7), vec![messages::CREATE_IN_GROUP.to_string()]);
    }

    #[tokio::test]
    async fn test_commands_without_game() {
        let (dispatcher, messenger) = dispatcher();

        dispatcher.handle(group_command(1, "/unirme")).await;
        assert_eq!(last_reply(&messenger), messages::NO_GAME_CREATE_HINT);
        dispatcher.handle(group_command(1, "/salirme")).await;
        assert_eq!(last_reply(&messenger), messages::NO_GAME);
        dispatcher.handle(group_command(1, "/estado")).await;
        assert_eq!(last_reply(&messenger), messages::NO_GAME_HERE);
        dispatcher.handle(group_command(1, "/resyncpartida")).await;
        assert_eq!(last_reply(&messenger), messages::NOTHING_IN_DB);
        dispatcher.handle(group_command(1, "/empezar")).await;
        assert_eq!(last_reply(&messenger), messages::NO_GAME_HERE);
    }

    #[tokio::test]
    async fn test_start_needs_four_players() {
        let (dispatcher, messenger) = dispatcher();
        dispatcher.handle(group_command(1, "/crearpartida")).await;
        dispatcher.handle(group_command(1, "/unirme")).await;

        dispatcher.handle(group_command(1, "/empezar")).await;

        assert_eq!(last_reply(&messenger), "Se necesitan al menos 4 jugadores.");
    }

    #[tokio::test]
    async fn test_start_then_join_is_closed() {
        let (dispatcher, messenger) = dispatcher();
        dispatcher.handle(group_command(1, "/crearpartida")).await;
        for id in 1..=4 {
            dispatcher.handle(group_command(id, "/unirme")).await;
        }

        dispatcher.handle(group_command(1, "/empezar")).await;
        assert_eq!(last_reply(&messenger), messages::NIGHT_STARTED);

        dispatcher.handle(group_command(5, "/unirme")).await;
        assert_eq!(last_reply(&messenger), messages::JOIN_CLOSED);
        dispatcher.handle(group_command(2, "/salirme")).await;
        assert_eq!(last_reply(&messenger), messages::CANNOT_LEAVE);
        dispatcher.handle(group_command(1, "/empezar")).await;
        assert_eq!(last_reply(&messenger), messages::ALREADY_STARTED);

        dispatcher.handle(group_command(1, "/estado")).await;
        assert!(last_reply(&messenger).starts_with("Partida en chat -100 - fase: night"));
    }

    #[tokio::test]
    async fn test_delete_requires_admin_or_host() {
        let (dispatcher, messenger) = dispatcher();
        dispatcher.handle(group_command(1, "/crearpartida")).await;

        dispatcher.handle(group_command(2, "/borrarpartida")).await;
        assert_eq!(last_reply(&messenger), messages::DELETE_FORBIDDEN);

        messenger.set_member_status(Some(MemberStatus::Administrator));
        dispatcher.handle(group_command(2, "/borrarpartida")).await;
        assert_eq!(last_reply(&messenger), messages::DELETED);

        dispatcher.handle(group_command(1, "/estado")).await;
        assert_eq!(last_reply(&messenger), messages::NO_GAME_HERE);
    }

    #[tokio::test]
    async fn test_delete_proceeds_when_lookup_fails() {
        let (dispatcher, messenger) = dispatcher();
        dispatcher.handle(group_command(1, "/crearpartida")).await;
        messenger.set_member_status(None);

        dispatcher.handle(group_command(3, "/borrarpartida")).await;

        assert_eq!(last_reply(&messenger), messages::DELETED);
    }

    #[tokio::test]
    async fn test_rate_limit_notice() {
        let (dispatcher, messenger) = dispatcher_with_limit(2);

        for _ in 0..3 {
            dispatcher.handle(group_command(1, "/ayuda")).await;
        }

        let replies = messenger.texts_to(GROUP);
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0], messages::HELP);
        assert_eq!(replies[2], messages::RATE_LIMITED);
    }

    #[tokio::test]
    async fn test_plain_text_is_ignored() {
        let (dispatcher, messenger) = dispatcher();

        dispatcher.handle(group_command(1, "buenas noches")).await;

        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_callback_edits_message() {
        let (dispatcher, messenger) = dispatcher();

        dispatcher.handle(press(1, 1, "nokey")).await;

        let answers = messenger.answers();
        assert_eq!(answers.len(), 1);
        assert!(!answers[0].show_alert);
        assert_eq!(
            messenger.edits(),
            vec![(1, 55, messages::INVALID_ACTION.to_string())]
        );
    }

    #[tokio::test]
    async fn test_callback_alert_does_not_edit() {
        let (dispatcher, messenger, pending) = fixture(100);
        let games = dispatcher.engine.games();
        games.create(GROUP, 1).await.unwrap();
        games.add_player(GROUP, 1, "Ana").await.unwrap();
        games.add_player(GROUP, 2, "Bea").await.unwrap();
        games
            .get(GROUP)
            .await
            .unwrap()
            .unwrap()
            .lock()
            .await
            .enter_phase(Phase::Night, None);

        let action = PendingAction::new(GROUP, ActionKind::Heal, Some(1), Some(2), 60);
        pending.upsert(&action).await.unwrap();

        dispatcher.handle(press(9, 9, &action.callback_data(2))).await;

        let answers = messenger.answers();
        assert_eq!(answers.len(), 1);
        assert!(answers[0].show_alert);
        assert_eq!(answers[0].text.as_deref(), Some(messages::NOT_AUTHORIZED));
        assert!(messenger.edits().is_empty());
    }
}
