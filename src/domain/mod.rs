//! Domain layer - Game rules, entities and the ports the engine talks through

pub mod error;
pub mod game;
pub mod messenger;
pub mod pending_action;
pub mod role;

pub use error::DomainError;
pub use game::{ChatId, Game, GameRepository, Phase, Player, UserId};
pub use messenger::{InlineButton, Keyboard, MemberStatus, MessageId, Messenger, TextFormat};
pub use pending_action::{ActionKind, PendingAction, PendingActionRepository};
pub use role::{Faction, NightActionKind, RoleKey};
