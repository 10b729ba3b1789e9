//! Persistence for jobs and their generation tasks.
//!
//! [`repositories`] holds the raw SQL against PostgreSQL. Callers outside this
//! crate go through the narrow traits in [`store`], backed either by
//! [`pg::PgJobStore`] or by [`memory::MemoryJobStore`] (local development
//! without a database, and tests).

use sqlx::postgres::PgPoolOptions;

pub mod memory;
pub mod models;
pub mod pg;
pub mod repositories;
pub mod store;

pub use store::{JobStore, StoreError, StoreHandles, TaskOutcomeWriter, TaskStateReader};

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

/// Apply the embedded migrations in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
