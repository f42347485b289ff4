use serde::Deserialize;

use crate::error::AppError;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string (delivery status store)
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 10)
    pub db_max_connections: u32,

    /// Redis connection string (dead-letter sink)
    pub redis_url: String,

    /// Base URL of the delivery subsystem HTTP API
    pub delivery_api_url: String,

    /// Bearer token for the delivery subsystem
    pub delivery_api_key: Option<String>,

    /// Per-request timeout against the delivery subsystem in seconds (default: 30)
    pub delivery_timeout_secs: u64,

    /// Worker identifier; a random UUID is generated when unset
    pub worker_id: Option<String>,

    /// Bounded queue capacity (default: 100)
    pub worker_queue_capacity: usize,

    /// How long `queue_email` waits for a free slot, in seconds (default: 5)
    pub worker_enqueue_timeout_secs: u64,

    /// Artificial delay before each dispatch in milliseconds (default: 0 = none)
    pub worker_processing_delay_ms: u64,

    /// Attempts after which the retry scanner stops retrying a message (default: 5)
    pub worker_max_retries: u32,

    /// Dispatcher idle timeout before maintenance reporting, in seconds (default: 30)
    pub worker_idle_interval_secs: u64,

    /// Retry scanner tick interval in seconds (default: 60)
    pub worker_retry_scan_interval_secs: u64,

    /// Failed messages fetched per retry scan (default: 10)
    pub worker_retry_batch_size: u32,

    /// Grace period `stop` waits for the loops, in seconds (default: 10)
    pub worker_shutdown_grace_secs: u64,

    /// Redis list receiving dead-letter records
    pub dead_letter_key: String,

    /// Maximum number of entries kept in the dead-letter list (default: 10000)
    pub dead_letter_max_len: usize,

    /// HTTP listen port (default: 3000)
    pub http_port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            delivery_api_url: required_env("DELIVERY_API_URL")?,
            delivery_api_key: std::env::var("DELIVERY_API_KEY").ok(),
            delivery_timeout_secs: parse_env("DELIVERY_TIMEOUT_SECS", 30)?,
            worker_id: std::env::var("WORKER_ID").ok(),
            worker_queue_capacity: parse_env("WORKER_QUEUE_CAPACITY", 100)?,
            worker_enqueue_timeout_secs: parse_env("WORKER_ENQUEUE_TIMEOUT_SECS", 5)?,
            worker_processing_delay_ms: parse_env("WORKER_PROCESSING_DELAY_MS", 0)?,
            worker_max_retries: parse_env("WORKER_MAX_RETRIES", 5)?,
            worker_idle_interval_secs: parse_env("WORKER_IDLE_INTERVAL_SECS", 30)?,
            worker_retry_scan_interval_secs: parse_env("WORKER_RETRY_SCAN_INTERVAL_SECS", 60)?,
            worker_retry_batch_size: parse_env("WORKER_RETRY_BATCH_SIZE", 10)?,
            worker_shutdown_grace_secs: parse_env("WORKER_SHUTDOWN_GRACE_SECS", 10)?,
            dead_letter_key: std::env::var("DEAD_LETTER_KEY")
                .unwrap_or_else(|_| "mailflow:dead_letters".to_string()),
            dead_letter_max_len: parse_env("DEAD_LETTER_MAX_LEN", 10_000)?,
            http_port: parse_env("HTTP_PORT", 3000)?,
        })
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    std::env::var(name)
        .map_err(|_| AppError::Config(format!("{} environment variable is required", name)))
}

/// Read a numeric variable, falling back to `default` when it is unset.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::Config(format!(
                "{} must be a valid {}",
                name,
                std::any::type_name::<T>()
            ))
        }),
        Err(_) => Ok(default),
    }
}
