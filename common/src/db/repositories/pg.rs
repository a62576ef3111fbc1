// PostgreSQL-backed store

use async_trait::async_trait;
use tracing::instrument;

use super::Store;
use crate::db::DbPool;
use crate::errors::DatabaseError;

/// Store backed by the shared connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    /// Create a new PgStore
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub(crate) fn pg(&self) -> &sqlx::PgPool {
        self.pool.pool()
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.pool.health_check().await
    }
}
