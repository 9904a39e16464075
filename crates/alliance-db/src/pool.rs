//! Connection pool construction.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::error::DbError;

/// Connects a pool sized for the batch workload.
///
/// The engine runs sequential phases with a small bounded worker pool, so a
/// modest pool is enough.
///
/// # Errors
///
/// Returns `DbError::ConnectionFailed` if the database is unreachable.
pub async fn connect(database_url: &str) -> Result<PgPool, DbError> {
    PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(DbError::ConnectionFailed)
}
