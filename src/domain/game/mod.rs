//! Game domain module
//!
//! One game lives in each group chat. The rules here are pure: role
//! dealing, night resolution, vote tallying and win detection.

mod assign;
mod entity;
mod night;
mod repository;
mod vote;
mod win;

pub use assign::assign_roles;
pub use entity::{
    clamp_phase_seconds, default_roles_config, unix_now, ChatId, Game, NightPick, NightState,
    Phase, Player, UserId, Vote, DEFAULT_DAY_SECONDS, DEFAULT_NIGHT_SECONDS,
    DEFAULT_REMINDER_SECONDS, MAX_PHASE_SECONDS, MIN_PHASE_SECONDS,
};
pub use night::{
    mafia_target, resolve_night, AttackSource, Investigation, InvestigationResult, NightEvent,
    NightReport,
};
pub use repository::GameRepository;
#[cfg(test)]
pub use repository::MockGameRepository;
pub use vote::{majority_target, tally_votes, VoteOutcome};
pub use win::{check_winner, Winner};
