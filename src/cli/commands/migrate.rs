use anyhow::Context;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config().database)
        .await
        .context("failed to connect to database")?;
    DatabaseManager::ensure_schema(&pool).await?;
    DatabaseManager::close(&pool).await;

    let statements = DatabaseManager::schema_statements().len();
    output_success(
        &output_format,
        "Schema is up to date",
        Some(json!({ "statements": statements })),
    )
}
