//! Database migrations infrastructure

use async_trait::async_trait;
use sqlx::Executor;
use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::domain::DomainError;

/// Trait for running database migrations
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Runs all pending migrations
    async fn run(&self) -> Result<(), DomainError>;
}

/// SQLite migrator recording applied versions in `_migrations`
#[derive(Debug)]
pub struct SqliteMigrator {
    pool: SqlitePool,
    migrations: Vec<Migration>,
}

impl SqliteMigrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            migrations: storage_migrations(),
        }
    }

    /// Creates the migrations table if it doesn't exist
    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                success INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    async fn is_applied(&self, version: i64) -> Result<bool, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations WHERE version = ?")
            .bind(version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to check migration status: {}", e))
            })?;

        Ok(count > 0)
    }

    /// Runs a single migration inside a transaction
    pub async fn run_migration(&self, migration: &Migration) -> Result<(), DomainError> {
        self.ensure_migrations_table().await?;

        if self.is_applied(migration.version).await? {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin migration: {}", e)))?;

        let conn: &mut sqlx::SqliteConnection = &mut tx;
        conn.execute(sqlx::raw_sql(&migration.up))
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("INSERT INTO _migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to record migration {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit migration: {}", e)))?;

        info!(
            version = migration.version,
            description = %migration.description,
            "Migration applied"
        );
        Ok(())
    }
}

#[async_trait]
impl Migrator for SqliteMigrator {
    async fn run(&self) -> Result<(), DomainError> {
        for migration in &self.migrations {
            self.run_migration(migration).await?;
        }

        Ok(())
    }
}

/// Represents a database migration
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    /// SQL to run when applying the migration
    pub up: String,
}

impl Migration {
    pub fn new(version: i64, description: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
        }
    }
}

/// Collection of migrations for the storage layer
pub fn storage_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create games, players and pending_actions tables",
            r#"
            CREATE TABLE IF NOT EXISTS games (
                chat_id INTEGER PRIMARY KEY,
                host_id INTEGER,
                phase TEXT,
                roles_config TEXT,
                night_seconds INTEGER,
                day_seconds INTEGER,
                periodic_reminder_seconds INTEGER,
                phase_deadline INTEGER,
                created_at INTEGER,
                updated_at INTEGER
            );

            CREATE TABLE IF NOT EXISTS players (
                chat_id INTEGER,
                user_id INTEGER,
                name TEXT,
                role_key TEXT,
                alive INTEGER,
                blocked INTEGER,
                silenced INTEGER,
                dm_sent_ok INTEGER DEFAULT 0,
                PRIMARY KEY (chat_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS pending_actions (
                key TEXT PRIMARY KEY,
                chat_id INTEGER,
                message_id INTEGER,
                action TEXT,
                actor_id INTEGER,
                extra_json TEXT,
                created_at INTEGER,
                expires_at INTEGER
            );
            "#,
        ),
        Migration::new(
            2,
            "Add night_state column to games",
            "ALTER TABLE games ADD COLUMN night_state TEXT",
        ),
        Migration::new(
            3,
            "Index pending actions by chat and expiry",
            r#"
            CREATE INDEX IF NOT EXISTS idx_pending_actions_chat ON pending_actions (chat_id);
            CREATE INDEX IF NOT EXISTS idx_pending_actions_expires ON pending_actions (expires_at);
            "#,
        ),
    ]
}

/// Apply every pending migration
pub async fn run_storage_migrations(pool: &SqlitePool) -> Result<(), DomainError> {
    SqliteMigrator::new(pool.clone()).run().await
}
