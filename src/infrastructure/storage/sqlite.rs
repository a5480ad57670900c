//! SQLite connection pooling

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::domain::DomainError;

/// SQLite storage configuration
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file path
    pub file: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// How long a writer waits for a locked database
    pub busy_timeout_secs: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::from(&DatabaseConfig::default())
    }
}

impl From<&DatabaseConfig> for SqliteConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            file: config.file.clone(),
            max_connections: config.max_connections,
            busy_timeout_secs: config.busy_timeout_secs,
        }
    }
}

impl SqliteConfig {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }
}

/// Open (creating if missing) the database file
pub async fn connect(config: &SqliteConfig) -> Result<SqlitePool, DomainError> {
    if let Some(parent) = std::path::Path::new(&config.file).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DomainError::storage(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.file)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to open SQLite database: {}", e)))?;

    info!(file = %config.file, "SQLite database opened");
    Ok(pool)
}

/// Private in-memory database on a single long-lived connection
pub async fn connect_in_memory() -> Result<SqlitePool, DomainError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| DomainError::storage(format!("Invalid SQLite options: {}", e)))?
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to open in-memory SQLite: {}", e)))
}

/// Cheap liveness query
pub async fn ping(pool: &SqlitePool) -> Result<(), DomainError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| DomainError::storage(format!("Database unavailable: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_creates_file_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("mafia.db");
        let config = SqliteConfig::new(file.to_string_lossy());

        let pool = connect(&config).await.unwrap();
        ping(&pool).await.unwrap();

        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_in_memory_pool_keeps_state() {
        let pool = connect_in_memory().await.unwrap();
        sqlx::query("CREATE TABLE t (x INTEGER)").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO t VALUES (1)").execute(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_config_from_database_section() {
        let config = SqliteConfig::from(&DatabaseConfig::default());
        assert_eq!(config.file, "mafia_complete.db");
        assert_eq!(config.busy_timeout_secs, 30);
    }
}
