use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use std::time::Duration;

const MAX_CONNECT_RETRIES: u32 = 5;

/// Connects with exponential backoff. `acquire_timeout` bounds how long a
/// contact write may wait for a free connection.
pub async fn create_pool(database_url: &str, acquire_timeout: Duration) -> Result<PgPool, sqlx::Error> {
    let mut retry_count = 0;
    let mut wait_seconds = 2;

    loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                info!("Contact database connection established.");
                return Ok(pool);
            }
            Err(e) if retry_count < MAX_CONNECT_RETRIES => {
                retry_count += 1;
                info!(
                    "Failed to connect to contact database (attempt {}/{}): {}. Retrying in {}s...",
                    retry_count, MAX_CONNECT_RETRIES, e, wait_seconds);

                tokio::time::sleep(Duration::from_secs(wait_seconds)).await;

                wait_seconds *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
