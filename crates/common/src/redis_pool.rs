use redis::Client;
use redis::aio::ConnectionManager;

/// Create a Redis connection manager and verify it answers `PING`.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let mut manager = ConnectionManager::new(client).await?;

    let _: String = redis::cmd("PING").query_async(&mut manager).await?;

    tracing::info!("Connected to Redis dead-letter sink");
    Ok(manager)
}
