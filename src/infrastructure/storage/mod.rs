//! Storage infrastructure - SQLite pool, migrations and repositories

mod game_repository;
mod in_memory;
pub mod migrations;
mod pending_action_repository;
mod sqlite;

pub use game_repository::SqliteGameRepository;
pub use in_memory::{InMemoryGameRepository, InMemoryPendingActionRepository};
pub use migrations::{run_storage_migrations, Migration, Migrator, SqliteMigrator};
pub use pending_action_repository::SqlitePendingActionRepository;
pub use sqlite::{connect, connect_in_memory, ping, SqliteConfig};
