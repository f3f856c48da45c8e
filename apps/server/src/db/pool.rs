//! Connection pool construction and schema migrations

use crate::config::DatabaseConfig;
use crate::{Error, Result, Stage};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Build the pool. Every connection gets the configured statement and lock timeouts.
pub async fn create_db_pool(config: &DatabaseConfig) -> Result<PgPool> {
    create_pool_for(config, &config.url).await
}

/// Same as [`create_db_pool`] against an explicit URL (the test database, for instance).
pub async fn create_pool_for(config: &DatabaseConfig, url: &str) -> Result<PgPool> {
    tracing::info!("Creating database connection pool...");

    let statement_timeout = config.statement_timeout_seconds;
    let lock_timeout = config.lock_timeout_seconds;

    let pool = PgPoolOptions::new()
        .min_connections(config.pool_min_size)
        .max_connections(config.pool_max_size)
        .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                // Set statement timeout (max query execution time)
                sqlx::query(&format!("SET statement_timeout = '{}s'", statement_timeout))
                    .execute(&mut *conn)
                    .await?;

                // Set lock timeout (max lock wait time - fail fast)
                sqlx::query(&format!("SET lock_timeout = '{}s'", lock_timeout))
                    .execute(&mut *conn)
                    .await?;

                Ok(())
            })
        })
        .connect(url)
        .await
        .map_err(|e| Error::store(Stage::Ping, e))?;

    tracing::info!(
        "Database pool created (min: {}, max: {})",
        config.pool_min_size,
        config.pool_max_size
    );

    Ok(pool)
}

/// Apply the bundled migrations (creates the `catalog` schema and tables).
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Store {
            stage: Stage::Migrate,
            source: e.into(),
        })?;
    Ok(())
}

/// Round trip to the store; used by the health endpoint.
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| Error::store(Stage::Ping, e))?;
    Ok(())
}
