//! Mafia game bot for Telegram group chats
//!
//! - Lobby, role dealing and night/day phases driven by inline buttons
//! - Timers that survive restarts (phase deadlines are persisted)
//! - SQLite persistence of games and pending button actions
//! - A token-protected operator dashboard

pub mod api;
pub mod bot;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
