//! Pending actions: inline-keyboard presses persisted until used or expired

mod entity;
mod repository;

pub use entity::{parse_callback_data, ActionExtra, ActionKind, PendingAction};
pub use repository::PendingActionRepository;
#[cfg(test)]
pub use repository::MockPendingActionRepository;
