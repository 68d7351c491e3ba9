//! Repository layer for database operations
//!
//! Every function takes the pool (or an open transaction) explicitly; there is
//! no process-wide connection handle.

pub mod matches;
pub mod profiles;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::DatabaseConfig;

/// Open a connection pool for the ledger database
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database URL: {}", config.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.busy_timeout())
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to database: {}", config.url))?;

    log::debug!(
        "Connected to {} (max {} connections)",
        config.url,
        config.max_connections
    );
    Ok(pool)
}

/// Apply embedded schema migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = test_support::memory_pool().await;
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name IN ('users', 'answers', 'matches') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, vec!["answers", "matches", "users"]);
    }

    #[tokio::test]
    async fn test_unreachable_database() {
        let config = DatabaseConfig {
            url: "sqlite:///nonexistent-dir/nested/ledger.db".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(connect(&config).await.is_err());
    }
}
