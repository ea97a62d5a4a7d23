use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use shared_error::AppError;

/// Initialize the Postgres connection pool — the authoritative store for
/// users, sessions, audit records, and credentials (spec.md §3).
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(AppError::from)
}

/// Initialize a Redis connection manager — backs the session mirror, the
/// token revocation set, and the decrypted data-key cache (C9/C6/C5). A
/// `ConnectionManager` reconnects transparently on drop, which is why it is
/// shared across the process rather than pooled connection-by-connection.
pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, AppError> {
    let client = redis::Client::open(redis_url).map_err(AppError::from)?;
    client.get_connection_manager().await.map_err(AppError::from)
}
