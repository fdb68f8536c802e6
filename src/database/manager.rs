use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use super::Collection;
use crate::config::DatabaseConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection pool setup and schema bootstrap for the Postgres record store
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config.url.as_deref().ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected to database: {}", Self::redacted(url)?);
        Ok(pool)
    }

    /// One `(id, doc, created_at)` table per collection plus unique
    /// expression indexes for the collection's unique keys
    pub fn schema_statements() -> Vec<String> {
        let mut statements = vec![];
        for collection in Collection::ALL {
            let table = collection.name();
            statements.push(format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (
                    id UUID PRIMARY KEY,
                    doc JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )",
                table
            ));
            for key in collection.unique_keys() {
                statements.push(format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS \"{table}_{key}_key\" ON \"{table}\" ((doc->>'{key}'))",
                    table = table,
                    key = key
                ));
            }
        }
        statements
    }

    pub async fn ensure_schema(pool: &PgPool) -> Result<(), DatabaseError> {
        for statement in Self::schema_statements() {
            sqlx::query(&statement).execute(pool).await?;
        }
        info!("Database schema is up to date");
        Ok(())
    }

    /// Close the pool on shutdown
    pub async fn close(pool: &PgPool) {
        pool.close().await;
        info!("Closed database pool");
    }

    /// Database URL without its password, for logs
    fn redacted(url: &str) -> Result<String, DatabaseError> {
        let mut parsed = url::Url::parse(url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if parsed.password().is_some() {
            parsed
                .set_password(Some("****"))
                .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(parsed.into())
    }
}
