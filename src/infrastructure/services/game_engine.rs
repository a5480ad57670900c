//! Game engine - drives phases, button presses and timers over the messenger

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use super::game_service::GameManager;
use super::pending_action_service::{Lookup, PendingActionService};
use crate::bot::messages;
use crate::config::GameConfig;
use crate::domain::game::{
    assign_roles, check_winner, clamp_phase_seconds, majority_target, resolve_night, tally_votes,
    unix_now, Game, VoteOutcome, Winner,
};
use crate::domain::pending_action::{parse_callback_data, ActionKind, PendingAction};
use crate::domain::{
    ChatId, DomainError, InlineButton, Keyboard, MessageId, Messenger, NightActionKind, Phase,
    RoleKey, TextFormat, UserId,
};
use crate::infrastructure::scheduler::{JobControl, JobKind, JobScheduler, GLOBAL_CHAT};

/// Engine timings and limits
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub voting_seconds: i64,
    pub mafia_confirm_seconds: i64,
    pub reminder_first_delay: Duration,
    pub min_players: usize,
    pub sweep_interval: Duration,
    /// Off when another process owns the phase timers
    pub timers_enabled: bool,
}

impl From<&GameConfig> for EngineSettings {
    fn from(config: &GameConfig) -> Self {
        Self {
            voting_seconds: config.voting_seconds.max(1),
            mafia_confirm_seconds: config.mafia_confirm_seconds.max(1),
            reminder_first_delay: Duration::from_secs(config.reminder_first_delay_secs),
            min_players: config.min_players,
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
            timers_enabled: true,
        }
    }
}

impl EngineSettings {
    /// Settings for a process that must never arm a job
    pub fn without_timers(mut self) -> Self {
        self.timers_enabled = false;
        self
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&GameConfig::default())
    }
}

/// What the bot should do with the pressed button's message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackOutcome {
    /// Replace the message text
    pub edit: Option<String>,
    /// Show a popup alert instead
    pub alert: Option<String>,
}

impl CallbackOutcome {
    pub fn edit(text: impl Into<String>) -> Self {
        Self {
            edit: Some(text.into()),
            alert: None,
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            edit: None,
            alert: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    NoGame,
    AlreadyStarted,
    NotEnoughPlayers { needed: usize },
}

/// Result of a dashboard time edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimesUpdated {
    pub chat_id: ChatId,
    pub used_id: ChatId,
    pub night_seconds: i64,
    pub day_seconds: i64,
}

fn secs(value: i64) -> Duration {
    Duration::from_secs(value.max(1) as u64)
}

pub struct GameEngine {
    games: Arc<GameManager>,
    actions: Arc<PendingActionService>,
    messenger: Arc<dyn Messenger>,
    scheduler: Arc<JobScheduler>,
    settings: EngineSettings,
    rng: StdMutex<StdRng>,
    /// Open mafia confirmation per chat
    confirm_keys: StdMutex<HashMap<ChatId, String>>,
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl GameEngine {
    pub fn new(
        games: Arc<GameManager>,
        actions: Arc<PendingActionService>,
        messenger: Arc<dyn Messenger>,
        scheduler: Arc<JobScheduler>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            games,
            actions,
            messenger,
            scheduler,
            settings,
            rng: StdMutex::new(StdRng::from_entropy()),
            confirm_keys: StdMutex::new(HashMap::new()),
        }
    }

    /// Deterministic role dealing
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdMutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn games(&self) -> &Arc<GameManager> {
        &self.games
    }

    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }

    /// Send a message, logging instead of failing
    async fn notify(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
        keyboard: Option<&Keyboard>,
    ) -> Option<MessageId> {
        match self
            .messenger
            .send_message(chat_id, text, format, keyboard)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(chat_id, error = %e, "Failed to send message");
                None
            }
        }
    }

    fn take_confirm_key(&self, chat_id: ChatId) -> Option<String> {
        self.confirm_keys
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&chat_id)
    }

    // Game start

    pub async fn start_game(
        self: &Arc<Self>,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<StartOutcome, DomainError> {
        let Some(shared) = self.games.get(chat_id).await? else {
            return Ok(StartOutcome::NoGame);
        };
        let mut game = shared.lock().await;

        if game.phase != Phase::Lobby {
            return Ok(StartOutcome::AlreadyStarted);
        }
        if game.players.len() < self.settings.min_players {
            return Ok(StartOutcome::NotEnoughPlayers {
                needed: self.settings.min_players,
            });
        }

        {
            let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
            assign_roles(&mut game, &mut *rng);
        }
        info!(chat_id, user_id, players = game.players.len(), "Roles assigned");

        let players: Vec<(UserId, String, Option<RoleKey>)> = game
            .players
            .values()
            .map(|p| (p.user_id, p.name.clone(), p.role))
            .collect();
        for (player_id, name, role) in players {
            let Some(role) = role else { continue };
            let delivered = self
                .messenger
                .send_message(player_id, &messages::role_dm(role), TextFormat::Markdown, None)
                .await;

            if let Some(player) = game.player_mut(player_id) {
                player.dm_sent_ok = delivered.is_ok();
            }
            if let Err(e) = delivered {
                warn!(chat_id, user_id = player_id, error = %e, "Role DM failed");
                self.notify(chat_id, &messages::dm_failed(&name), TextFormat::Plain, None)
                    .await;
            }
        }

        let deadline = unix_now() + game.night_seconds;
        game.night.clear();
        game.enter_phase(Phase::Night, Some(deadline));
        self.games.persist(&game).await?;

        self.notify(chat_id, messages::NIGHT_STARTED, TextFormat::Plain, None)
            .await;
        self.prompt_night(&game).await?;

        self.schedule_phase_end(chat_id, Phase::Night, secs(game.night_seconds));
        self.schedule_reminder(chat_id, game.periodic_reminder_seconds);

        info!(chat_id, deadline, "Game started");
        Ok(StartOutcome::Started)
    }

    /// DM every night actor a keyboard of targets
    pub async fn prompt_night(&self, game: &Game) -> Result<(), DomainError> {
        let actors: Vec<(UserId, RoleKey, NightActionKind)> = game
            .alive_players()
            .filter_map(|p| {
                let role = p.role?;
                Some((p.user_id, role, role.night_action()?))
            })
            .collect();

        for (actor, role, kind) in actors {
            let action = ActionKind::for_night_action(kind);
            let mut keys = Vec::new();
            let mut buttons = Vec::new();

            for target in game.alive_players().filter(|p| p.user_id != actor) {
                let pending = self
                    .actions
                    .create(
                        game.chat_id,
                        action,
                        Some(actor),
                        Some(target.user_id),
                        game.phase_deadline,
                    )
                    .await?;
                buttons.push(InlineButton::new(
                    target.name.clone(),
                    pending.callback_data(target.user_id),
                ));
                keys.push(pending.key);
            }

            if buttons.is_empty() {
                self.notify(actor, &messages::night_no_targets(role), TextFormat::Markdown, None)
                    .await;
                continue;
            }

            let keyboard = Keyboard::single_column(buttons);
            if let Some(message_id) = self
                .notify(actor, &messages::night_prompt(role), TextFormat::Markdown, Some(&keyboard))
                .await
            {
                self.actions.set_message_id(&keys, message_id).await?;
            }
        }

        debug!(chat_id = game.chat_id, "Night prompts sent");
        Ok(())
    }

    // Button presses

    pub async fn handle_callback(
        self: &Arc<Self>,
        user_id: UserId,
        data: &str,
    ) -> Result<CallbackOutcome, DomainError> {
        if !data.contains(':') {
            return Ok(CallbackOutcome::edit(messages::INVALID_ACTION));
        }
        let Ok((key, pressed_target)) = parse_callback_data(data) else {
            return Ok(CallbackOutcome::edit(messages::INVALID_TARGET));
        };

        let pending = match self.actions.lookup(&key, unix_now()).await? {
            Lookup::Missing => return Ok(CallbackOutcome::edit(messages::EXPIRED_OR_INVALID)),
            Lookup::Expired => return Ok(CallbackOutcome::edit(messages::EXPIRED)),
            Lookup::Found(pending) => pending,
        };

        let Some(shared) = self.games.get(pending.chat_id).await? else {
            return Ok(CallbackOutcome::edit(messages::GAME_NOT_FOUND));
        };

        if pending.actor_id.is_some_and(|actor| actor != user_id) {
            return Ok(CallbackOutcome::alert(messages::NOT_AUTHORIZED));
        }

        let chat_id = pending.chat_id;
        let mut request_confirmation = false;

        let outcome = {
            let mut game = shared.lock().await;

            let expected = if pending.action == ActionKind::VoteGroup {
                Phase::Voting
            } else {
                Phase::Night
            };
            if game.phase != expected {
                return Ok(CallbackOutcome::edit(messages::WRONG_PHASE));
            }

            let target = pending.target.unwrap_or(pressed_target);
            if !game.is_alive(target) {
                return Ok(CallbackOutcome::edit(messages::TARGET_UNAVAILABLE));
            }
            let target_name = game.player_name(target);

            match pending.action {
                ActionKind::VoteGroup => {
                    if !game.is_alive(user_id) {
                        return Ok(CallbackOutcome::alert(messages::ONLY_ALIVE_VOTE));
                    }
                    game.record_day_vote(user_id, target);
                    self.games.persist(&game).await?;
                    info!(chat_id, user_id, target, "Day vote recorded");
                    CallbackOutcome::edit(messages::voted(&target_name))
                }
                ActionKind::MafiaConfirm => {
                    let voters = game.mafia_voters();
                    if !voters.contains(&user_id) {
                        return Ok(CallbackOutcome::alert(messages::ONLY_MAFIA));
                    }

                    let Some(confirmed) = self.actions.confirm(&pending.key, user_id).await? else {
                        return Ok(CallbackOutcome::edit(messages::EXPIRED_OR_INVALID));
                    };

                    if voters.iter().all(|v| confirmed.contains(v)) {
                        game.night.mafia_confirmed = Some(target);
                        game.touch();
                        self.games.persist(&game).await?;
                        self.actions.delete(&pending.key).await?;
                        self.take_confirm_key(chat_id);
                        self.scheduler.cancel(chat_id, JobKind::MafiaConfirm);
                        info!(chat_id, target, "Mafia target confirmed unanimously");
                        CallbackOutcome::edit(messages::target_confirmed(&target_name))
                    } else {
                        CallbackOutcome::edit(messages::confirmations(confirmed.len()))
                    }
                }
                action => {
                    if !game.is_alive(user_id) {
                        return Ok(CallbackOutcome::edit(messages::DEAD_CANNOT_ACT));
                    }
                    let role = game.player(user_id).and_then(|p| p.role);

                    let (kind, text) = match action {
                        ActionKind::MafiaPick => (
                            NightActionKind::MafiaPick,
                            messages::mafia_vote_recorded(&target_name),
                        ),
                        ActionKind::Heal => {
                            (NightActionKind::Heal, messages::heal_chosen(&target_name))
                        }
                        ActionKind::Block => {
                            (NightActionKind::Block, messages::block_chosen(&target_name))
                        }
                        ActionKind::Guard => {
                            (NightActionKind::Guard, messages::guard_chosen(&target_name))
                        }
                        ActionKind::Investigate => (
                            NightActionKind::Investigate,
                            messages::investigate_chosen(&target_name),
                        ),
                        ActionKind::Blackmail => (
                            NightActionKind::Blackmail,
                            messages::blackmail_chosen(&target_name),
                        ),
                        ActionKind::Kill | ActionKind::SerialKill => {
                            let kind = if action == ActionKind::SerialKill
                                || role == Some(RoleKey::SerialKiller)
                            {
                                NightActionKind::SerialKill
                            } else {
                                NightActionKind::VigilanteShot
                            };
                            (kind, messages::attack_chosen(&target_name))
                        }
                        ActionKind::MafiaConfirm | ActionKind::VoteGroup => {
                            return Ok(CallbackOutcome::edit(messages::INVALID_ACTION));
                        }
                    };

                    if kind == NightActionKind::MafiaPick {
                        game.record_mafia_vote(user_id, target);
                        // A changed vote reopens the confirmation
                        game.night.mafia_confirmed = None;
                        request_confirmation = true;
                    } else {
                        game.record_pick(kind, user_id, target);
                    }
                    self.games.persist(&game).await?;

                    info!(chat_id, user_id, target, action = %action, "Night action recorded");
                    CallbackOutcome::edit(text)
                }
            }
        };

        if request_confirmation {
            self.request_mafia_confirmation(chat_id).await?;
        }

        Ok(outcome)
    }

    /// Ask the mafia to confirm the majority target once everyone voted
    pub async fn request_mafia_confirmation(
        self: &Arc<Self>,
        chat_id: ChatId,
    ) -> Result<bool, DomainError> {
        let Some(shared) = self.games.get(chat_id).await? else {
            return Ok(false);
        };
        let game = shared.lock().await;

        if game.phase != Phase::Night || !game.all_mafia_voted() {
            return Ok(false);
        }
        let Some(target) = majority_target(&game.night.mafia_votes) else {
            return Ok(false);
        };

        if let Some(previous) = self.take_confirm_key(chat_id) {
            self.actions.delete(&previous).await?;
        }

        let expires_at = unix_now() + self.settings.mafia_confirm_seconds;
        let pending = self
            .actions
            .create(chat_id, ActionKind::MafiaConfirm, None, Some(target), Some(expires_at))
            .await?;
        let keyboard = Keyboard::single_column(vec![InlineButton::new(
            messages::CONFIRM_BUTTON,
            pending.callback_data(target),
        )]);
        let text = messages::mafia_proposal(&game.player_name(target));

        let mut last_message = None;
        for voter in game.mafia_voters() {
            if let Some(id) = self
                .notify(voter, &text, TextFormat::Markdown, Some(&keyboard))
                .await
            {
                last_message = Some(id);
            }
        }
        if let Some(message_id) = last_message {
            self.actions
                .set_message_id(std::slice::from_ref(&pending.key), message_id)
                .await?;
        }

        self.confirm_keys
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(chat_id, pending.key.clone());

        if !self.settings.timers_enabled {
            return Ok(true);
        }
        let engine = Arc::clone(self);
        let key = pending.key.clone();
        self.scheduler.schedule_once(
            chat_id,
            JobKind::MafiaConfirm,
            secs(self.settings.mafia_confirm_seconds),
            async move {
                if let Err(e) = engine.mafia_confirm_timeout(chat_id, &key).await {
                    error!(chat_id, error = %e, "Mafia confirmation timeout failed");
                }
            },
        );

        info!(chat_id, target, key = %pending.key, "Mafia confirmation requested");
        Ok(true)
    }

    /// Apply the majority when the mafia did not confirm in time
    pub async fn mafia_confirm_timeout(
        &self,
        chat_id: ChatId,
        key: &str,
    ) -> Result<(), DomainError> {
        let Some(pending) = self.actions.get(key).await? else {
            return Ok(());
        };

        {
            let mut keys = self.confirm_keys.lock().unwrap_or_else(|p| p.into_inner());
            if keys.get(&chat_id).is_some_and(|k| k == key) {
                keys.remove(&chat_id);
            }
        }

        let Some(shared) = self.games.get(chat_id).await? else {
            self.actions.delete(key).await?;
            return Ok(());
        };
        let mut game = shared.lock().await;

        let voters = game.mafia_voters();
        let unanimous = voters.iter().all(|v| pending.confirmations.contains(v));
        if unanimous || game.phase != Phase::Night {
            self.actions.delete(key).await?;
            return Ok(());
        }

        if let Some(target) = majority_target(&game.night.mafia_votes) {
            game.night.mafia_confirmed = Some(target);
            game.touch();
            self.games.persist(&game).await?;

            let text = messages::mafia_majority_applied(&game.player_name(target));
            for voter in voters {
                self.notify(voter, &text, TextFormat::Plain, None).await;
            }
            info!(chat_id, target, "Mafia majority applied after timeout");
        }

        self.actions.delete(key).await?;
        Ok(())
    }

    // Phase transitions

    /// Resolve the night and move to day; `false` when not in night
    pub async fn end_night(self: &Arc<Self>, chat_id: ChatId) -> Result<bool, DomainError> {
        let Some(shared) = self.games.get(chat_id).await? else {
            return Ok(false);
        };
        let mut game = shared.lock().await;

        if game.phase != Phase::Night {
            debug!(chat_id, phase = %game.phase, "Night end skipped");
            return Ok(false);
        }

        self.scheduler.cancel(chat_id, JobKind::MafiaConfirm);
        self.take_confirm_key(chat_id);
        self.actions.purge_chat(chat_id).await?;

        let report = resolve_night(&mut game);
        self.games.persist(&game).await?;
        info!(chat_id, deaths = report.deaths().len(), "Night resolved");

        for investigation in &report.investigations {
            self.notify(
                investigation.investigator,
                &messages::investigation(&investigation.result),
                TextFormat::Plain,
                None,
            )
            .await;
        }

        self.notify(
            chat_id,
            &messages::night_summary(&game, &report),
            TextFormat::Markdown,
            None,
        )
        .await;

        if let Some(winner) = report.winner {
            self.finish(&mut game, winner).await?;
            return Ok(true);
        }

        let deadline = unix_now() + game.day_seconds;
        game.enter_phase(Phase::Day, Some(deadline));
        self.games.persist(&game).await?;

        self.notify(chat_id, messages::DAY_STARTED, TextFormat::Plain, None)
            .await;
        self.schedule_phase_end(chat_id, Phase::Day, secs(game.day_seconds));

        Ok(true)
    }

    /// Close the discussion and open the lynch vote
    pub async fn end_day(self: &Arc<Self>, chat_id: ChatId) -> Result<bool, DomainError> {
        let Some(shared) = self.games.get(chat_id).await? else {
            return Ok(false);
        };
        let mut game = shared.lock().await;

        if game.phase != Phase::Day {
            debug!(chat_id, phase = %game.phase, "Day end skipped");
            return Ok(false);
        }

        let deadline = unix_now() + self.settings.voting_seconds;
        game.night.day_votes.clear();
        game.enter_phase(Phase::Voting, Some(deadline));
        self.games.persist(&game).await?;

        self.notify(chat_id, messages::VOTING_STARTED, TextFormat::Plain, None)
            .await;

        let candidates: Vec<(UserId, String)> = game
            .alive_players()
            .map(|p| (p.user_id, p.name.clone()))
            .collect();
        let mut keys = Vec::new();
        let mut buttons = Vec::new();
        for (candidate, name) in candidates {
            let pending = self
                .actions
                .create(chat_id, ActionKind::VoteGroup, None, Some(candidate), Some(deadline))
                .await?;
            buttons.push(InlineButton::new(name, pending.callback_data(candidate)));
            keys.push(pending.key);
        }

        if !buttons.is_empty() {
            let keyboard = Keyboard::single_column(buttons);
            if let Some(message_id) = self
                .notify(chat_id, messages::VOTE_PROMPT, TextFormat::Plain, Some(&keyboard))
                .await
            {
                self.actions.set_message_id(&keys, message_id).await?;
            }
        }

        self.schedule_phase_end(chat_id, Phase::Voting, secs(self.settings.voting_seconds));
        info!(chat_id, deadline, "Voting opened");
        Ok(true)
    }

    /// Count the lynch vote and start the next night
    pub async fn resolve_votes(self: &Arc<Self>, chat_id: ChatId) -> Result<bool, DomainError> {
        let Some(shared) = self.games.get(chat_id).await? else {
            return Ok(false);
        };
        let mut game = shared.lock().await;

        if game.phase != Phase::Voting {
            debug!(chat_id, phase = %game.phase, "Vote resolution skipped");
            return Ok(false);
        }

        self.actions.purge_chat(chat_id).await?;
        let outcome = tally_votes(&game.night.day_votes);

        let night_text = match &outcome {
            VoteOutcome::NoVotes => {
                self.notify(chat_id, messages::NO_VOTES, TextFormat::Plain, None)
                    .await;
                messages::NIGHT_RETURNS
            }
            VoteOutcome::Tie(_) => {
                self.notify(chat_id, messages::TIE, TextFormat::Plain, None)
                    .await;
                messages::NIGHT_BEGINS
            }
            VoteOutcome::Lynch(target) => {
                if let Some(player) = game.player_mut(*target).filter(|p| p.alive) {
                    player.alive = false;
                    let text = messages::lynched(&player.name, player.role);
                    info!(chat_id, target, "Player lynched");
                    self.notify(chat_id, &text, TextFormat::Markdown, None)
                        .await;
                }
                messages::NIGHT_BEGINS
            }
        };

        for player in game.players.values_mut() {
            player.silenced = false;
        }
        game.night.clear();
        game.touch();

        if let Some(winner) = check_winner(&game) {
            self.finish(&mut game, winner).await?;
            return Ok(true);
        }

        let deadline = unix_now() + game.night_seconds;
        game.enter_phase(Phase::Night, Some(deadline));
        self.games.persist(&game).await?;

        self.notify(chat_id, night_text, TextFormat::Plain, None).await;
        self.prompt_night(&game).await?;
        self.schedule_phase_end(chat_id, Phase::Night, secs(game.night_seconds));
        if !self.scheduler.is_scheduled(chat_id, JobKind::Reminder) {
            self.schedule_reminder(chat_id, game.periodic_reminder_seconds);
        }

        Ok(true)
    }

    async fn finish(&self, game: &mut Game, winner: Winner) -> Result<(), DomainError> {
        self.notify(game.chat_id, messages::winner(winner), TextFormat::Plain, None)
            .await;

        game.enter_phase(Phase::Inactive, None);
        self.games.persist(game).await?;
        self.scheduler.cancel_chat(game.chat_id);

        info!(chat_id = game.chat_id, ?winner, "Game finished");
        Ok(())
    }

    /// Periodic phase reminder; stops once the game is over or gone
    pub async fn send_reminder(&self, chat_id: ChatId) -> JobControl {
        let shared = match self.games.get(chat_id).await {
            Ok(Some(shared)) => shared,
            Ok(None) => return JobControl::Stop,
            Err(e) => {
                warn!(chat_id, error = %e, "Reminder could not load game");
                return JobControl::Continue;
            }
        };

        let (phase, alive) = {
            let game = shared.lock().await;
            (game.phase, game.alive_count())
        };
        if !phase.is_timed() {
            return JobControl::Stop;
        }

        self.notify(
            chat_id,
            &messages::reminder(phase, alive),
            TextFormat::Markdown,
            None,
        )
        .await;
        JobControl::Continue
    }

    // Scheduling

    fn schedule_phase_end(self: &Arc<Self>, chat_id: ChatId, phase: Phase, delay: Duration) {
        if !self.settings.timers_enabled {
            return;
        }
        let engine = Arc::clone(self);

        match phase {
            Phase::Night => {
                self.scheduler
                    .schedule_once(chat_id, JobKind::NightEnd, delay, async move {
                        if let Err(e) = engine.end_night(chat_id).await {
                            error!(chat_id, error = %e, "Night end failed");
                        }
                    })
            }
            Phase::Day => {
                self.scheduler
                    .schedule_once(chat_id, JobKind::DayEnd, delay, async move {
                        if let Err(e) = engine.end_day(chat_id).await {
                            error!(chat_id, error = %e, "Day end failed");
                        }
                    })
            }
            Phase::Voting => {
                self.scheduler
                    .schedule_once(chat_id, JobKind::VoteEnd, delay, async move {
                        if let Err(e) = engine.resolve_votes(chat_id).await {
                            error!(chat_id, error = %e, "Vote resolution failed");
                        }
                    })
            }
            Phase::Lobby | Phase::Inactive => {}
        }
    }

    fn schedule_reminder(self: &Arc<Self>, chat_id: ChatId, every_secs: i64) {
        if !self.settings.timers_enabled {
            return;
        }
        let engine = Arc::clone(self);
        self.scheduler.schedule_repeating(
            chat_id,
            JobKind::Reminder,
            self.settings.reminder_first_delay,
            secs(every_secs),
            move || {
                let engine = Arc::clone(&engine);
                Box::pin(async move { engine.send_reminder(chat_id).await })
            },
        );
    }

    /// Re-arm the timers of a game from its stored deadline
    pub fn reschedule_game(self: &Arc<Self>, game: &Game) -> bool {
        if !self.settings.timers_enabled {
            return false;
        }
        let Some(deadline) = game.phase_deadline.filter(|_| game.phase.is_timed()) else {
            return false;
        };

        let remaining = (deadline - unix_now()).max(1);
        self.schedule_phase_end(game.chat_id, game.phase, secs(remaining));
        self.schedule_reminder(game.chat_id, game.periodic_reminder_seconds);

        debug!(chat_id = game.chat_id, phase = %game.phase, remaining, "Timers rescheduled");
        true
    }

    /// Re-arm every running game, used at startup
    pub async fn reschedule_all(self: &Arc<Self>) -> usize {
        let mut count = 0;
        for game in self.games.snapshot().await {
            if self.reschedule_game(&game) {
                count += 1;
            }
        }

        info!(games = count, "Phase timers rescheduled");
        count
    }

    /// Periodically delete expired pending actions
    pub fn start_sweeper(self: &Arc<Self>) {
        if !self.settings.timers_enabled {
            return;
        }
        let actions = Arc::clone(&self.actions);
        let every = self.settings.sweep_interval;

        self.scheduler
            .schedule_repeating(GLOBAL_CHAT, JobKind::Sweep, every, every, move || {
                let actions = Arc::clone(&actions);
                Box::pin(async move {
                    if let Err(e) = actions.sweep_expired().await {
                        warn!(error = %e, "Pending action sweep failed");
                    }
                    JobControl::Continue
                })
            });
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    // Operator actions

    /// Run the night resolution now, in the background
    pub async fn force_resolve_night(
        self: &Arc<Self>,
        chat_id: ChatId,
    ) -> Result<ChatId, DomainError> {
        let (used_id, shared) = self
            .games
            .get_either_sign(chat_id)
            .await?
            .ok_or_else(|| DomainError::not_found("no game"))?;

        if shared.lock().await.phase != Phase::Night {
            return Err(DomainError::validation("Game is not in the night phase"));
        }

        self.scheduler.cancel(used_id, JobKind::NightEnd);
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.end_night(used_id).await {
                error!(chat_id = used_id, error = %e, "Forced night resolution failed");
            }
        });

        info!(chat_id = used_id, "Night resolution forced");
        Ok(used_id)
    }

    pub async fn update_times(
        self: &Arc<Self>,
        chat_id: ChatId,
        night_seconds: Option<i64>,
        day_seconds: Option<i64>,
    ) -> Result<TimesUpdated, DomainError> {
        if night_seconds.is_none() && day_seconds.is_none() {
            return Err(DomainError::validation("no_values_provided"));
        }

        let (used_id, shared) = self
            .games
            .get_either_sign(chat_id)
            .await?
            .ok_or_else(|| DomainError::not_found("game_not_found"))?;
        let mut game = shared.lock().await;

        if let Some(night) = night_seconds {
            game.night_seconds = clamp_phase_seconds(night);
        }
        if let Some(day) = day_seconds {
            game.day_seconds = clamp_phase_seconds(day);
        }
        game.touch();
        self.games.persist(&game).await?;
        self.reschedule_game(&game);

        info!(
            chat_id = game.chat_id,
            night_seconds = game.night_seconds,
            day_seconds = game.day_seconds,
            "Phase times updated"
        );

        Ok(TimesUpdated {
            chat_id: game.chat_id,
            used_id,
            night_seconds: game.night_seconds,
            day_seconds: game.day_seconds,
        })
    }

    pub async fn reset_to_lobby(&self, chat_id: ChatId) -> Result<ChatId, DomainError> {
        let (used_id, shared) = self
            .games
            .get_either_sign(chat_id)
            .await?
            .ok_or_else(|| DomainError::not_found("no game"))?;
        let mut game = shared.lock().await;

        self.scheduler.cancel_chat(used_id);
        self.take_confirm_key(used_id);
        self.actions.purge_chat(used_id).await?;

        game.reset_to_lobby();
        self.games.persist(&game).await?;

        info!(chat_id = used_id, "Game reset to lobby");
        Ok(used_id)
    }

    /// Post a player's role to the group when their DM failed
    pub async fn resend_role(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<ChatId, DomainError> {
        let (used_id, shared) = self
            .games
            .get_either_sign(chat_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Not found"))?;

        let (name, role) = {
            let game = shared.lock().await;
            let player = game
                .player(user_id)
                .ok_or_else(|| DomainError::not_found("Player not found"))?;
            (player.name.clone(), player.role)
        };
        let role = role.ok_or_else(|| DomainError::validation("Role not assigned"))?;

        self.messenger
            .send_message(
                used_id,
                &messages::resend_role(&name, role),
                TextFormat::Markdown,
                None,
            )
            .await?;

        info!(chat_id = used_id, user_id, "Role re-sent to group");
        Ok(used_id)
    }

    /// Delete a game once any in-flight mutation on it has finished
    pub async fn delete_game(&self, chat_id: ChatId) -> Result<bool, DomainError> {
        let shared = self.games.get(chat_id).await?;
        let _guard = match &shared {
            Some(shared) => Some(shared.lock().await),
            None => None,
        };

        self.scheduler.cancel_chat(chat_id);
        self.take_confirm_key(chat_id);
        self.games.remove(chat_id).await
    }

    /// Pending action of a button, for tests and diagnostics
    pub async fn pending_action(&self, key: &str) -> Result<Option<PendingAction>, DomainError> {
        self.actions.get(key).await
    }
}
