use std::env;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::AppError;

/// Creates the single PostgreSQL connection pool backing the Store. The
/// core has no RLS/multi-role requirement, so unlike the wider platform's
/// dual-pool split this crate needs only one pool, tuned the same way.
pub async fn create_pool(database_url: &str) -> Result<PgPool, AppError> {
    let max_connections = env::var("DB_POOL_MAX")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let min_connections = env::var("DB_POOL_MIN")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(2);
    let acquire_timeout_ms = env::var("DB_POOL_ACQUIRE_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(3000);
    let idle_timeout_secs = env::var("DB_POOL_IDLE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60);
    let max_lifetime_secs = env::var("DB_POOL_MAX_LIFETIME_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(1800);
    let statement_timeout_ms = env::var("DB_STATEMENT_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(15000);
    let idle_in_tx_timeout_ms = env::var("DB_IDLE_IN_TX_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10000);

    let max_retries = 3;
    let mut last_error = None;

    for attempt in 1..=max_retries {
        log::info!("Database pool connection attempt {} of {}", attempt, max_retries);

        let stmt_timeout = statement_timeout_ms;
        let idle_tx_timeout = idle_in_tx_timeout_ms;

        match PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_millis(acquire_timeout_ms))
            .idle_timeout(Duration::from_secs(idle_timeout_secs))
            .max_lifetime(Duration::from_secs(max_lifetime_secs))
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query("SET application_name = 'tokenmeter-server'")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("SET TIME ZONE 'UTC'").execute(&mut *conn).await?;
                    if let Err(err) =
                        sqlx::query(&format!("SET statement_timeout TO '{}ms'", stmt_timeout))
                            .execute(&mut *conn)
                            .await
                    {
                        log::warn!("Unable to set statement_timeout: {}", err);
                    }
                    if let Err(err) = sqlx::query(&format!(
                        "SET idle_in_transaction_session_timeout TO '{}ms'",
                        idle_tx_timeout
                    ))
                    .execute(&mut *conn)
                    .await
                    {
                        log::warn!("Unable to set idle_in_transaction_session_timeout: {}", err);
                    }
                    Ok(())
                })
            })
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                log::info!(
                    "Database pool established - max: {}, min: {}, acquire_timeout: {}ms",
                    max_connections,
                    min_connections,
                    acquire_timeout_ms
                );
                return Ok(pool);
            }
            Err(e) => {
                log::warn!("Database pool connection attempt {} failed: {}", attempt, e);

                if e.to_string().contains("authentication failed") {
                    log::error!("Database authentication failed. Check DATABASE_URL credentials.");
                    return Err(AppError::Storage(e.to_string()));
                }
                if e.to_string().contains("Connection refused") {
                    log::error!("Database connection refused. Check that the database is running.");
                }

                last_error = Some(e);
                if attempt < max_retries {
                    let delay = Duration::from_secs(2 * attempt as u64);
                    log::info!("Retrying in {} seconds...", delay.as_secs());
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    let error = last_error
        .unwrap_or_else(|| sqlx::Error::Configuration("unknown database connection error".into()));
    log::error!("All database pool connection attempts failed: {}", error);
    Err(AppError::Storage(error.to_string()))
}

/// Verifies the database connection by executing a simple query. Used at
/// startup and by the `/health` endpoint.
pub async fn verify_connection(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query_as::<_, (i32,)>("SELECT 1")
        .fetch_optional(pool)
        .await
        .map(|_| ())
        .map_err(|e| {
            log::error!("Database connection verification failed: {}", e);
            AppError::Storage(e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_connection() {
        if let Ok(url) = env::var("DATABASE_URL") {
            if let Ok(pool) = create_pool(&url).await {
                let _ = verify_connection(&pool).await;
            }
        }
    }
}
