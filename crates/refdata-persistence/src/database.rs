//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "SQLite connection pool lifecycle."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::str::FromStr;

use refdata_common::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::migrations::{self, MigrationStatus};
use crate::repositories::Repositories;
use crate::Result;

/// Connection pool wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    config: DatabaseConfig,
}

impl Database {
    /// Open (and create if missing) the configured database, migrating it
    /// when `auto_migrate` is set.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = if config.is_in_memory() {
            // Every connection to `:memory:` is a separate database, so the
            // pool must hold exactly one that never expires.
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let options = SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(options)
                .await?
        };

        info!(
            path = %config.path.display(),
            max_connections = config.max_connections,
            "database connected"
        );

        let db = Self {
            pool,
            config: config.clone(),
        };
        if config.auto_migrate {
            db.migrate().await?;
        }
        Ok(db)
    }

    /// Fresh private in-memory database with the schema applied.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&DatabaseConfig::in_memory()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        migrations::migration_status(&self.pool).await
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// Repository handles sharing this pool.
    pub fn repositories(&self) -> Repositories {
        Repositories::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
