//! Telegram Bot API transport: HTTP client, wire types and the update poller

mod client;
mod offline;
mod poller;
pub mod types;

pub use client::TelegramClient;
pub use offline::OfflineMessenger;
pub use poller::{UpdateHandler, UpdatePoller};
pub use types::{CallbackQuery, Chat, Message, Update, User};
