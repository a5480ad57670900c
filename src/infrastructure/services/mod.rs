//! Infrastructure services

mod game_engine;
mod game_service;
mod pending_action_service;

pub use game_engine::{CallbackOutcome, EngineSettings, GameEngine, StartOutcome, TimesUpdated};
pub use game_service::{GameDefaults, GameManager, ReloadOutcome, SharedGame};
pub use pending_action_service::{Lookup, PendingActionService};
