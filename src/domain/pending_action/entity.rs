use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::game::{unix_now, ChatId, UserId};
use crate::domain::role::NightActionKind;
use crate::domain::DomainError;

/// What pressing a button does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    MafiaPick,
    MafiaConfirm,
    Heal,
    Block,
    Guard,
    Kill,
    SerialKill,
    Investigate,
    Blackmail,
    VoteGroup,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MafiaPick => "mafia_pick",
            Self::MafiaConfirm => "mafia_confirm",
            Self::Heal => "heal",
            Self::Block => "block",
            Self::Guard => "guard",
            Self::Kill => "kill",
            Self::SerialKill => "serial_kill",
            Self::Investigate => "investigate",
            Self::Blackmail => "blackmail",
            Self::VoteGroup => "vote_group",
        }
    }

    /// Button action offered to a role's night ability
    pub fn for_night_action(kind: NightActionKind) -> Self {
        match kind {
            NightActionKind::MafiaPick => Self::MafiaPick,
            NightActionKind::Heal => Self::Heal,
            NightActionKind::Block => Self::Block,
            NightActionKind::Guard => Self::Guard,
            NightActionKind::VigilanteShot => Self::Kill,
            NightActionKind::SerialKill => Self::SerialKill,
            NightActionKind::Investigate => Self::Investigate,
            NightActionKind::Blackmail => Self::Blackmail,
        }
    }

    pub fn is_night_action(&self) -> bool {
        !matches!(self, Self::VoteGroup)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mafia_pick" => Ok(Self::MafiaPick),
            "mafia_confirm" => Ok(Self::MafiaConfirm),
            "heal" => Ok(Self::Heal),
            "block" => Ok(Self::Block),
            "guard" => Ok(Self::Guard),
            "kill" => Ok(Self::Kill),
            "serial_kill" => Ok(Self::SerialKill),
            "investigate" => Ok(Self::Investigate),
            "blackmail" => Ok(Self::Blackmail),
            "vote_group" => Ok(Self::VoteGroup),
            other => Err(DomainError::validation(format!("Unknown action '{}'", other))),
        }
    }
}

/// Extra payload persisted alongside an action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionExtra {
    #[serde(default)]
    pub target: Option<UserId>,
    #[serde(default)]
    pub confirmations: Vec<UserId>,
}

/// A button press waiting to happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub key: String,
    pub chat_id: ChatId,
    pub message_id: i64,
    pub action: ActionKind,
    /// Only this user may press the button; `None` lets anyone eligible press it
    pub actor_id: Option<UserId>,
    pub target: Option<UserId>,
    pub confirmations: Vec<UserId>,
    pub created_at: i64,
    pub expires_at: i64,
}

impl PendingAction {
    pub fn new(
        chat_id: ChatId,
        action: ActionKind,
        actor_id: Option<UserId>,
        target: Option<UserId>,
        ttl_secs: i64,
    ) -> Self {
        let now = unix_now();

        Self {
            key: uuid::Uuid::new_v4().to_string(),
            chat_id,
            message_id: 0,
            action,
            actor_id,
            target,
            confirmations: Vec::new(),
            created_at: now,
            expires_at: now + ttl_secs,
        }
    }

    pub fn with_expires_at(mut self, expires_at: i64) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    pub fn extra(&self) -> ActionExtra {
        ActionExtra {
            target: self.target,
            confirmations: self.confirmations.clone(),
        }
    }

    /// Telegram callback payload for a button aimed at `target`
    pub fn callback_data(&self, target: UserId) -> String {
        format!("{}:{}", self.key, target)
    }
}

/// Split `"{key}:{target}"` callback data
pub fn parse_callback_data(data: &str) -> Result<(String, UserId), DomainError> {
    let (key, target) = data
        .split_once(':')
        .ok_or_else(|| DomainError::validation("Invalid callback data"))?;

    let target = target
        .trim()
        .parse::<UserId>()
        .map_err(|_| DomainError::validation("Invalid callback target"))?;

    Ok((key.to_string(), target))
}
