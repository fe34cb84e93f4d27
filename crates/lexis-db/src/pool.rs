//! PostgreSQL pool sizing for the lexis repositories.
//!
//! A cohort-wide migration or merge keeps up to `[bulk] concurrency` members
//! in flight, each holding one connection while its save runs. The pool is
//! sized from that figure plus one spare for the cohort listing, and keeps
//! no idle floor since CLI invocations are one-shot.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use lexis_core::defaults::{DB_CONNECT_TIMEOUT_SECS, DB_IDLE_TIMEOUT_SECS, DB_MAX_CONNECTIONS};
use lexis_core::{Error, Result};

/// Connection limits for the entity and template repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on open connections; never below the bulk fan-out.
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a save waits for a free connection before failing.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DB_MAX_CONNECTIONS,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(DB_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DB_IDLE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool able to serve `concurrency` bulk members at once.
    pub fn for_bulk_concurrency(concurrency: usize) -> Self {
        let needed = u32::try_from(concurrency)
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        Self::default().max_connections(needed.max(DB_MAX_CONNECTIONS))
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Open a pool with [`PoolConfig::default`].
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        duration_ms = start.elapsed().as_millis() as u64,
        "PostgreSQL pool ready"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_has_no_idle_floor() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, DB_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, 0);
    }

    #[test]
    fn test_small_fan_out_keeps_default_ceiling() {
        let config = PoolConfig::for_bulk_concurrency(4);
        assert_eq!(config.max_connections, DB_MAX_CONNECTIONS);
    }

    #[test]
    fn test_wide_fan_out_gets_a_connection_per_member() {
        let config = PoolConfig::for_bulk_concurrency(64);
        assert_eq!(config.max_connections, 65);

        let config = PoolConfig::for_bulk_concurrency(usize::MAX);
        assert_eq!(config.max_connections, u32::MAX);
    }

    #[test]
    fn test_acquire_timeout_override() {
        let config = PoolConfig::new().acquire_timeout(Duration::from_secs(5));
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(DB_IDLE_TIMEOUT_SECS));
    }
}
