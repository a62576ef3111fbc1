// Bootstrap utilities for binary initialization

use crate::config::Settings;
use crate::db::{DbPool, SchemaInitializer};
use anyhow::{Context, Result};
use tracing::info;

/// Load and validate settings
///
/// # Errors
/// Returns error if a configuration source is malformed or validation fails
pub fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|reason| anyhow::anyhow!("Invalid configuration: {}", reason))?;
    Ok(settings)
}

/// Connect to the database, retrying with backoff
///
/// # Errors
/// Returns error once every attempt allowed by `database.retry` has failed
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!(
        url = %settings.database.redacted_url(),
        max_attempts = settings.database.retry.max_attempts,
        "Initializing database pool"
    );

    let db_pool = DbPool::connect_with_retry(&settings.database)
        .await
        .context("Failed to connect to the database")?;

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Create any missing tables of the configured schema variant
///
/// # Errors
/// Returns error if a table cannot be created; this is not retried
#[tracing::instrument(skip(settings, db_pool))]
pub async fn init_schema(settings: &Settings, db_pool: &DbPool) -> Result<Vec<&'static str>> {
    let variant = settings.schema.variant;
    info!(variant = %variant, "Ensuring database schema");

    let tables = SchemaInitializer::new(db_pool.pool().clone())
        .ensure(variant)
        .await
        .with_context(|| format!("Failed to initialize the {} schema", variant))?;

    info!(variant = %variant, tables = ?tables, "Database schema ready");
    Ok(tables)
}

/// Connection plus schema: everything that must succeed before serving
///
/// # Errors
/// Returns the first fatal failure; the pool is closed if schema creation fails
pub async fn init_database(settings: &Settings) -> Result<DbPool> {
    let db_pool = init_database_pool(settings).await?;

    if let Err(e) = init_schema(settings, &db_pool).await {
        db_pool.close().await;
        return Err(e);
    }

    Ok(db_pool)
}
