use std::time::Duration;

use mailflow_common::config::AppConfig;
use uuid::Uuid;

/// Bounded queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// How long an enqueue waits for a free slot before failing.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);
/// Dispatcher inactivity before a maintenance report.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(30);
/// Retry scanner tick interval.
pub const DEFAULT_RETRY_SCAN_INTERVAL: Duration = Duration::from_secs(60);
/// Failed messages fetched per retry scan.
pub const DEFAULT_RETRY_BATCH_SIZE: u32 = 10;
/// How long `stop` waits for both loops to exit.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
/// Attempt count at which the retry scanner gives up on a message.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Floor for the idle and retry scan intervals. Shorter values are raised to it.
pub const MIN_LOOP_INTERVAL: Duration = Duration::from_secs(1);

/// Tunables for a single worker instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub queue_capacity: usize,
    pub enqueue_timeout: Duration,
    /// Artificial wait before each dispatch; `None` disables it.
    pub processing_delay: Option<Duration>,
    pub max_retries: u32,
    pub idle_interval: Duration,
    pub retry_scan_interval: Duration,
    pub retry_batch_size: u32,
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: Uuid::new_v4().to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
            processing_delay: None,
            max_retries: DEFAULT_MAX_RETRIES,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            retry_scan_interval: DEFAULT_RETRY_SCAN_INTERVAL,
            retry_batch_size: DEFAULT_RETRY_BATCH_SIZE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl From<&AppConfig> for WorkerConfig {
    fn from(config: &AppConfig) -> Self {
        let processing_delay = match config.worker_processing_delay_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Self {
            worker_id: config
                .worker_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            queue_capacity: config.worker_queue_capacity,
            enqueue_timeout: Duration::from_secs(config.worker_enqueue_timeout_secs),
            processing_delay,
            max_retries: config.worker_max_retries,
            idle_interval: Duration::from_secs(config.worker_idle_interval_secs),
            retry_scan_interval: Duration::from_secs(config.worker_retry_scan_interval_secs),
            retry_batch_size: config.worker_retry_batch_size,
            shutdown_grace: Duration::from_secs(config.worker_shutdown_grace_secs),
        }
    }
}
