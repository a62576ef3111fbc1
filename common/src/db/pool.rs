// PostgreSQL connection pool with bounded retry on startup

use crate::config::DatabaseConfig;
use crate::errors::DatabaseError;
use crate::retry::{retry_with_backoff, ExponentialBackoff, RetryStrategy};
use crate::telemetry;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

/// Database connection pool wrapper
/// Provides a managed connection pool to PostgreSQL with health checking
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    /// Connect using the backoff policy from `config.retry`.
    ///
    /// Returns as soon as one attempt yields a validated pool. When every
    /// attempt fails the last driver error is returned as
    /// `DatabaseError::ConnectionFailed`; callers treat that as fatal.
    pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let strategy = ExponentialBackoff::from_config(&config.retry);
        Self::connect_with_strategy(config, &strategy).await
    }

    /// Same as [`connect_with_retry`](Self::connect_with_retry) with an explicit strategy
    #[instrument(skip(config, strategy), fields(url = %config.redacted_url(), max_attempts = strategy.max_attempts()))]
    pub async fn connect_with_strategy<S>(
        config: &DatabaseConfig,
        strategy: &S,
    ) -> Result<Self, DatabaseError>
    where
        S: RetryStrategy + ?Sized,
    {
        info!("Initializing database connection pool");

        let pool = retry_with_backoff(strategy, "database_connect", is_transient, |attempt| {
            async move {
                tracing::debug!(attempt, "Connecting to database");
                let result = Self::try_connect(config).await;
                telemetry::record_db_connect_attempt(result.is_ok());
                result
            }
        })
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Successfully connected to the database"
        );

        Ok(Self { pool })
    }

    async fn try_connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(config.connect_options())
            .await?;

        // A pool that cannot answer a trivial query is not a live connection
        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            pool.close().await;
            return Err(e);
        }

        Ok(pool)
    }

    /// Get a reference to the underlying pool
    ///
    /// This is used by repositories to execute queries
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Perform a health check on the database connection
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Database health check failed");
                DatabaseError::HealthCheckFailed(e.to_string())
            })?;

        tracing::debug!("Database health check passed");
        Ok(())
    }

    /// Get the current number of connections in the pool
    pub fn size(&self) -> u32 {
        self.pool.size()
    }

    /// Close the connection pool gracefully
    #[instrument(skip(self))]
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

/// Whether a connection error may clear up by itself.
///
/// Bad configuration and rejected credentials (SQLSTATE class 28) are final.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Configuration(_) => false,
        sqlx::Error::Database(db_err) => !db_err
            .code()
            .map(|code| code.starts_with("28"))
            .unwrap_or(false),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::io;

    #[test]
    fn test_io_errors_are_transient() {
        let err = sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(is_transient(&err));
        assert!(is_transient(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn test_configuration_errors_are_not_transient() {
        let err = sqlx::Error::Configuration("invalid port".into());
        assert!(!is_transient(&err));
    }

    #[tokio::test]
    async fn test_unreachable_database_fails_after_single_attempt_budget() {
        let mut config = Settings::default().database;
        // Port 1 on loopback refuses immediately
        config.host = "127.0.0.1".to_string();
        config.port = 1;
        config.acquire_timeout_seconds = 1;
        let strategy = ExponentialBackoff::with_config(1, 2, 1024, 0.0);

        let result = DbPool::connect_with_strategy(&config, &strategy).await;
        assert!(matches!(result, Err(DatabaseError::ConnectionFailed(_))));
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL instance
    async fn test_pool_creation_and_health_check() {
        let settings = Settings::load().expect("settings");
        let pool = DbPool::connect_with_retry(&settings.database)
            .await
            .expect("pool");
        assert!(pool.health_check().await.is_ok());
        pool.close().await;
    }
}
