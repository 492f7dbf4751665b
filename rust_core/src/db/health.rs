//! Setup-time datastore checks.
//!
//! An unreachable datastore is a fatal setup error, so the binary checks
//! connectivity once before any run starts.

use crate::error::is_retriable_message;
use crate::retry::{execute_with_retry, RetryPolicy};
use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

/// Check if database pool is healthy
pub async fn check_pool_health(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Database health check failed")?;
    Ok(())
}

/// Health check that rides out a datastore still starting up.
pub async fn wait_for_pool(pool: &PgPool, policy: &RetryPolicy) -> Result<()> {
    execute_with_retry(
        policy,
        "database health check",
        || check_pool_health(pool),
        |e: &anyhow::Error| is_retriable_message(&format!("{:#}", e)),
    )
    .await?;

    let stats = pool_stats(pool);
    info!(
        "Database reachable (connections: {} total, {} idle, {} active)",
        stats.size,
        stats.idle,
        stats.active()
    );
    Ok(())
}

pub fn pool_stats(pool: &PgPool) -> PoolStats {
    PoolStats {
        size: pool.size(),
        idle: pool.num_idle(),
    }
}

#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Total number of connections in the pool
    pub size: u32,
    /// Number of idle connections
    pub idle: usize,
}

impl PoolStats {
    pub fn active(&self) -> u32 {
        self.size.saturating_sub(self.idle as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_connections() {
        let stats = PoolStats { size: 4, idle: 1 };
        assert_eq!(stats.active(), 3);
        let stats = PoolStats { size: 1, idle: 3 };
        assert_eq!(stats.active(), 0);
    }
}
