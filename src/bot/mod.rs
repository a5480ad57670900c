//! Telegram bot front: commands, update dispatch and user-facing texts

mod commands;
mod dispatcher;
pub mod messages;

pub use commands::Command;
pub use dispatcher::Dispatcher;
