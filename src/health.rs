use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use sqlx::PgPool;

/// Durable backends probed by `/health`
#[derive(Clone)]
pub struct Backends {
    pub db_pool: PgPool,
    pub redis: ConnectionManager,
}

impl Backends {
    pub fn new(db_pool: PgPool, redis: ConnectionManager) -> Self {
        Self { db_pool, redis }
    }

    pub async fn health_check(&self) -> Result<()> {
        // Check database
        sqlx::query("SELECT 1")
            .execute(&self.db_pool)
            .await
            .context("database unreachable")?;

        // Check Redis
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("redis unreachable")?;

        Ok(())
    }
}
