//! Datastore connection pool configuration
//!
//! A sync run holds at most a few connections at once: one for the
//! reconciler's writes and one per run lock.

use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Clone, Debug)]
pub struct DbPoolConfig {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum lifetime of a connection (prevents stale connections)
    pub max_lifetime: Duration,
    /// Maximum idle time before a connection is closed
    pub idle_timeout: Duration,
    /// Connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            min_connections: 1,
            max_lifetime: Duration::from_secs(1800), // 30 minutes
            idle_timeout: Duration::from_secs(600),  // 10 minutes
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl DbPoolConfig {
    /// Load configuration from `DB_POOL_*` variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let env_u64 = |key: &str| std::env::var(key).ok().and_then(|v| v.parse::<u64>().ok());

        Self {
            max_connections: std::env::var("DB_POOL_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            min_connections: std::env::var("DB_POOL_MIN_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_connections),
            max_lifetime: env_u64("DB_POOL_MAX_LIFETIME_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_lifetime),
            idle_timeout: env_u64("DB_POOL_IDLE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
            acquire_timeout: env_u64("DB_POOL_ACQUIRE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.acquire_timeout),
        }
    }

    /// `sync all` runs one job at a time but holds a lock connection per job.
    pub fn with_min_capacity(mut self, connections: u32) -> Self {
        self.max_connections = self.max_connections.max(connections);
        self.min_connections = self.min_connections.min(self.max_connections);
        self
    }
}

/// Create a PostgreSQL connection pool
pub async fn create_pool(database_url: &str, config: &DbPoolConfig) -> Result<PgPool> {
    info!(
        "Creating database pool: max={}, min={}, acquire_timeout={:?}",
        config.max_connections, config.min_connections, config.acquire_timeout
    );

    let connect_opts =
        PgConnectOptions::from_str(database_url).context("Failed to parse DATABASE_URL")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_opts)
        .await
        .context("Failed to create database pool")?;

    info!("Database pool created successfully");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbPoolConfig::default();
        assert!(config.max_connections > 0);
        assert!(config.min_connections <= config.max_connections);
    }

    #[test]
    fn test_min_capacity_only_grows() {
        let config = DbPoolConfig::default().with_min_capacity(3);
        assert_eq!(config.max_connections, 8);
        let config = DbPoolConfig::default().with_min_capacity(12);
        assert_eq!(config.max_connections, 12);
    }
}
