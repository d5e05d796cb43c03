//! PostgreSQL connection pool for the hosted relational store
//!
//! The hosted service exposes its database over the regular PostgreSQL
//! protocol; this module provides pooling, health checks and the optional
//! schema migration.

use serde::Deserialize;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use crate::repositories::{StoreError, StoreResult};

/// Database configuration struct
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Apply the bundled migrations at start-up
    #[serde(default)]
    pub run_migrations: bool,
}

/// Initialize a PostgreSQL connection pool
pub async fn init_pool(config: &DatabaseConfig) -> StoreResult<PgPool> {
    let options = config
        .url
        .parse()
        .map_err(|e| StoreError::Configuration(format!("Invalid database URL: {}", e)))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(StoreError::Connection)?;

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        info!("Database migrations applied");
    }

    Ok(pool)
}

/// Check database connectivity
pub async fn health_check(pool: &PgPool) -> StoreResult<bool> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(StoreError::Query)?;

    Ok(true)
}
