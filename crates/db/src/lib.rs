//! Persistence for job records and flow overrides.
//!
//! The coordinator and services talk to the [`JobStore`] and
//! [`FlowConfigStore`] traits. [`PgJobStore`] / [`PgFlowConfigStore`] back
//! them with Postgres; [`MemoryJobStore`] / [`MemoryFlowConfigStore`] keep
//! the same semantics in process for tests and database-less runs.

use sqlx::postgres::PgPoolOptions;

pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use memory::{MemoryFlowConfigStore, MemoryJobStore};
pub use store::{FlowConfigStore, JobStore, PgFlowConfigStore, PgJobStore, StoreError};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
