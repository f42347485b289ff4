//! Mailflow worker binary: email worker plus its HTTP front.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mailflow_common::config::AppConfig;
use mailflow_common::db::{create_pool, run_migrations};
use mailflow_common::redis_pool::create_redis_pool;
use mailflow_notifier::dead_letter::RedisDeadLetterSink;
use mailflow_notifier::http_delivery::HttpDeliveryService;
use mailflow_notifier::store::PgDeliveryStore;
use mailflow_notifier::{EmailWorker, WorkerConfig};

use mailflow_api::routes::create_router;
use mailflow_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("mailflow_api=info,mailflow_notifier=info,tower_http=info")
        }))
        .json()
        .init();

    tracing::info!("Mailflow worker starting...");

    let config = AppConfig::from_env()?;

    // Status store
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    // Dead-letter sink
    let redis = create_redis_pool(&config.redis_url).await?;

    let service = HttpDeliveryService::new(
        config.delivery_api_url.clone(),
        config.delivery_api_key.clone(),
        Duration::from_secs(config.delivery_timeout_secs),
    )?;

    let worker = Arc::new(EmailWorker::new(
        WorkerConfig::from(&config),
        Arc::new(service),
        Arc::new(PgDeliveryStore::new(pool)),
        Arc::new(RedisDeadLetterSink::new(
            redis,
            config.dead_letter_key.clone(),
            config.dead_letter_max_len,
        )),
    ));

    let root = CancellationToken::new();
    worker.start(&root)?;

    let app = create_router(AppState::new(worker.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = root.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal, stopping gracefully...");
                }
                _ = shutdown.cancelled() => {}
            }
        })
        .await?;

    root.cancel();
    worker.stop().await?;

    tracing::info!("Mailflow worker stopped.");
    Ok(())
}
