//! Postgres pool for the recipe catalog
//!
//! The service opens one pool at startup, retrying while Postgres comes up,
//! applies the embedded migrations and shares the pool between the CRUD
//! routes and the suggestion source.

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::ConnectOptions;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Reported to Postgres so sessions show up by name in `pg_stat_activity`
const APPLICATION_NAME: &str = "dinner-tonight";
/// Statements slower than this are logged at warn level
const SLOW_STATEMENT: Duration = Duration::from_secs(1);
/// Ceiling for the startup backoff between connection attempts
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Connection counts reported by `/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

impl Database {
    /// Open the pool, retrying transient failures up to `connect_retries` times
    #[instrument(skip(config), fields(retries = config.connect_retries))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = retry_transient(
            || create_pool(config),
            config.connect_retries,
            Duration::from_secs(1),
        )
        .await?;
        Ok(Self { pool })
    }

    /// Wrap a pool built elsewhere (tests, tools)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database {
                message: format!("Health check failed: {}", e).into(),
                source: Some(e),
            })?;
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    pub async fn close(&self) {
        info!("Closing catalog pool ({} connections)", self.pool.size());
        self.pool.close().await;
    }
}

/// Build a pool and prove it can reach the server
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    debug!(
        "Opening catalog pool: max={}, min={}, acquire_timeout={:?}",
        config.max_connections, config.min_connections, config.connect_timeout
    );

    let options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| Error::Config {
            message: format!("Invalid DATABASE_URL: {}", e).into(),
            source: None,
        })?
        .application_name(APPLICATION_NAME)
        .statement_cache_capacity(config.statement_cache_size)
        .log_statements(log::LevelFilter::Debug)
        .log_slow_statements(log::LevelFilter::Warn, SLOW_STATEMENT);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .map_err(|e| Error::Database {
            message: format!("Failed to open catalog pool: {}", e).into(),
            source: Some(e),
        })?;

    info!("🗄️ Catalog pool ready ({} connections)", pool.size());
    Ok(pool)
}

/// Apply the embedded schema migrations
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Migration(e.to_string()))?;

    info!("Catalog schema is up to date");
    Ok(())
}

/// Run `operation` until it succeeds, fails permanently, or `attempts` are used
/// up, doubling the pause between attempts.
async fn retry_transient<T, F, Fut>(mut operation: F, attempts: u32, first_delay: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut delay = first_delay;

    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt == attempts => return Err(e),
            Err(e) => {
                warn!(
                    "Catalog database unavailable (attempt {}/{}), retrying in {:?}: {}",
                    attempt, attempts, delay, e
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
        }
    }

    Err(Error::database("no connection attempts were made"))
}
