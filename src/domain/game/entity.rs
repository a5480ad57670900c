//! Game and player entities

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::role::{NightActionKind, RoleKey};
use crate::domain::DomainError;

/// Telegram chat identifier (negative for groups)
pub type ChatId = i64;

/// Telegram user identifier
pub type UserId = i64;

pub const DEFAULT_NIGHT_SECONDS: i64 = 300;
pub const DEFAULT_DAY_SECONDS: i64 = 600;
pub const DEFAULT_REMINDER_SECONDS: i64 = 120;

pub const MIN_PHASE_SECONDS: i64 = 120;
pub const MAX_PHASE_SECONDS: i64 = 7 * 24 * 3600;

/// Clamp a phase duration into the accepted range
pub fn clamp_phase_seconds(seconds: i64) -> i64 {
    seconds.clamp(MIN_PHASE_SECONDS, MAX_PHASE_SECONDS)
}

/// Current unix time in seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Default role distribution for a new game
pub fn default_roles_config() -> BTreeMap<RoleKey, i64> {
    BTreeMap::from([(RoleKey::Mafioso, 1), (RoleKey::Citizen, 3)])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Lobby,
    Night,
    Day,
    Voting,
    Inactive,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Night => "night",
            Self::Day => "day",
            Self::Voting => "voting",
            Self::Inactive => "inactive",
        }
    }

    /// Parse a stored phase; unknown values fall back to the lobby
    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "night" => Self::Night,
            "day" => Self::Day,
            "voting" => Self::Voting,
            "inactive" => Self::Inactive,
            _ => Self::Lobby,
        }
    }

    /// Phases driven by a deadline timer
    pub fn is_timed(&self) -> bool {
        matches!(self, Self::Night | Self::Day | Self::Voting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: UserId,
    pub name: String,
    pub role: Option<RoleKey>,
    pub alive: bool,
    pub blocked: bool,
    pub silenced: bool,
    pub dm_sent_ok: bool,
}

impl Player {
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            role: None,
            alive: true,
            blocked: false,
            silenced: false,
            dm_sent_ok: false,
        }
    }

    pub fn with_role(mut self, role: RoleKey) -> Self {
        self.role = Some(role);
        self
    }

    /// Role display name, `?` when unassigned
    pub fn role_name(&self) -> &'static str {
        self.role.map(|r| r.name()).unwrap_or("?")
    }
}

/// A night ability aimed at a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightPick {
    pub kind: NightActionKind,
    pub actor: UserId,
    pub target: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: UserId,
    pub target: UserId,
}

/// Everything chosen during the current night and vote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightState {
    #[serde(default)]
    pub picks: Vec<NightPick>,
    #[serde(default)]
    pub mafia_votes: Vec<Vote>,
    #[serde(default)]
    pub mafia_confirmed: Option<UserId>,
    #[serde(default)]
    pub day_votes: Vec<Vote>,
}

impl NightState {
    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
            && self.mafia_votes.is_empty()
            && self.mafia_confirmed.is_none()
            && self.day_votes.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Picks of one kind, in the order they were made
    pub fn picks_of(&self, kind: NightActionKind) -> impl Iterator<Item = &NightPick> {
        self.picks.iter().filter(move |p| p.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub chat_id: ChatId,
    pub host_id: UserId,
    pub phase: Phase,
    pub roles_config: BTreeMap<RoleKey, i64>,
    pub night_seconds: i64,
    pub day_seconds: i64,
    pub periodic_reminder_seconds: i64,
    pub phase_deadline: Option<i64>,
    pub players: BTreeMap<UserId, Player>,
    pub night: NightState,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Game {
    pub fn new(chat_id: ChatId, host_id: UserId) -> Self {
        let now = unix_now();

        Self {
            chat_id,
            host_id,
            phase: Phase::Lobby,
            roles_config: default_roles_config(),
            night_seconds: DEFAULT_NIGHT_SECONDS,
            day_seconds: DEFAULT_DAY_SECONDS,
            periodic_reminder_seconds: DEFAULT_REMINDER_SECONDS,
            phase_deadline: None,
            players: BTreeMap::new(),
            night: NightState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = unix_now();
    }

    pub fn player(&self, user_id: UserId) -> Option<&Player> {
        self.players.get(&user_id)
    }

    pub fn player_mut(&mut self, user_id: UserId) -> Option<&mut Player> {
        self.players.get_mut(&user_id)
    }

    pub fn is_alive(&self, user_id: UserId) -> bool {
        self.player(user_id).is_some_and(|p| p.alive)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.alive)
    }

    pub fn alive_count(&self) -> usize {
        self.alive_players().count()
    }

    /// Alive players who vote on the mafia kill
    pub fn mafia_voters(&self) -> Vec<UserId> {
        self.alive_players()
            .filter(|p| p.role.is_some_and(|r| r.is_mafia_voter()))
            .map(|p| p.user_id)
            .collect()
    }

    /// Display name of a player, or their id when unknown
    pub fn player_name(&self, user_id: UserId) -> String {
        self.player(user_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| user_id.to_string())
    }

    pub fn add_player(
        &mut self,
        user_id: UserId,
        name: impl Into<String>,
    ) -> Result<(), DomainError> {
        if self.phase != Phase::Lobby {
            return Err(DomainError::validation("Players can only join in the lobby"));
        }

        if self.players.contains_key(&user_id) {
            return Err(DomainError::conflict(format!(
                "User {} already joined game {}",
                user_id, self.chat_id
            )));
        }

        self.players.insert(user_id, Player::new(user_id, name));
        self.touch();
        Ok(())
    }

    pub fn remove_player(&mut self, user_id: UserId) -> Result<Player, DomainError> {
        if self.phase != Phase::Lobby {
            return Err(DomainError::validation("Players can only leave in the lobby"));
        }

        let player = self.players.remove(&user_id).ok_or_else(|| {
            DomainError::not_found(format!("User {} is not in game {}", user_id, self.chat_id))
        })?;

        self.touch();
        Ok(player)
    }

    /// Enter a phase, with an optional deadline in unix seconds
    pub fn enter_phase(&mut self, phase: Phase, deadline: Option<i64>) {
        self.phase = phase;
        self.phase_deadline = deadline;
        self.touch();
    }

    pub fn reset_to_lobby(&mut self) {
        self.phase = Phase::Lobby;
        self.roles_config = default_roles_config();
        self.phase_deadline = None;
        self.night.clear();

        for player in self.players.values_mut() {
            player.role = None;
            player.alive = true;
            player.blocked = false;
            player.silenced = false;
            player.dm_sent_ok = false;
        }

        self.touch();
    }

    /// Record a night ability; an actor keeps one pick per kind
    pub fn record_pick(&mut self, kind: NightActionKind, actor: UserId, target: UserId) {
        self.night
            .picks
            .retain(|p| !(p.actor == actor && p.kind == kind));
        self.night.picks.push(NightPick { kind, actor, target });
        self.touch();
    }

    pub fn record_mafia_vote(&mut self, voter: UserId, target: UserId) {
        self.night.mafia_votes.retain(|v| v.voter != voter);
        self.night.mafia_votes.push(Vote { voter, target });
        self.touch();
    }

    pub fn record_day_vote(&mut self, voter: UserId, target: UserId) {
        self.night.day_votes.retain(|v| v.voter != voter);
        self.night.day_votes.push(Vote { voter, target });
        self.touch();
    }

    /// Every alive mafia voter has cast a vote
    pub fn all_mafia_voted(&self) -> bool {
        let voters = self.mafia_voters();

        !voters.is_empty()
            && voters
                .iter()
                .all(|id| self.night.mafia_votes.iter().any(|v| v.voter == *id))
    }

    /// Number of players each configured role would receive
    pub fn configured_role_count(&self) -> i64 {
        self.roles_config.values().map(|c| (*c).max(0)).sum()
    }
}
