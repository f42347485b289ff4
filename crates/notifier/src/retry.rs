//! Periodic retry scanner.
//!
//! Runs beside the dispatcher on its own interval. Each tick it lists a batch
//! of failed messages from the status store and re-submits the ones whose
//! scheduled retry time has passed and whose attempt budget is not spent.
//! Bookkeeping stays with the store: the scanner never writes status and
//! never dead-letters exhausted messages, it just stops retrying them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use mailflow_common::types::DeliveryStatus;

use crate::config::MIN_LOOP_INTERVAL;
use crate::service::{DeliveryService, DeliveryStore};

/// Verdict for a single retry candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Due,
    /// No next-retry timestamp recorded.
    NotScheduled,
    NotYetDue,
    /// Attempt count reached the configured maximum.
    Exhausted,
    /// Already sent or dead.
    Terminal,
}

/// Decide whether `status` may be retried at `now`.
pub fn evaluate(status: &DeliveryStatus, now: DateTime<Utc>, max_retries: u32) -> RetryDecision {
    if status.state.is_terminal() {
        return RetryDecision::Terminal;
    }

    let Some(next_retry_at) = status.next_retry_at else {
        return RetryDecision::NotScheduled;
    };

    if now < next_retry_at {
        return RetryDecision::NotYetDue;
    }

    if i64::from(status.attempt_count) >= i64::from(max_retries) {
        return RetryDecision::Exhausted;
    }

    RetryDecision::Due
}

/// Per-tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub candidates: usize,
    pub retried: usize,
    pub skipped: usize,
    /// Status lookups or retry submissions that returned an error.
    pub failed: usize,
}

pub struct RetryScanner {
    worker_id: String,
    service: Arc<dyn DeliveryService>,
    store: Arc<dyn DeliveryStore>,
    max_retries: u32,
    batch_size: u32,
    interval: Duration,
}

impl RetryScanner {
    pub fn new(
        worker_id: impl Into<String>,
        service: Arc<dyn DeliveryService>,
        store: Arc<dyn DeliveryStore>,
        max_retries: u32,
        batch_size: u32,
        interval: Duration,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            service,
            store,
            max_retries,
            batch_size,
            interval: interval.max(MIN_LOOP_INTERVAL),
        }
    }

    /// Tick every `interval` until `shutdown` fires. The first scan happens
    /// one full interval after start.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            worker_id = %self.worker_id,
            interval_secs = self.interval.as_secs(),
            "Retry scanner started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.scan_once(Utc::now(), &shutdown).await;
                    if report.candidates > 0 {
                        tracing::debug!(
                            worker_id = %self.worker_id,
                            candidates = report.candidates,
                            retried = report.retried,
                            skipped = report.skipped,
                            failed = report.failed,
                            "Retry scan complete"
                        );
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Retry scanner stopped");
    }

    /// One scan pass evaluated against `now`. Stops early if `shutdown` fires
    /// between candidates.
    pub async fn scan_once(&self, now: DateTime<Utc>, shutdown: &CancellationToken) -> ScanReport {
        let mut report = ScanReport::default();

        let candidates = match self.store.get_failed_messages(self.batch_size).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(
                    worker_id = %self.worker_id,
                    error = %e,
                    "Failed to fetch failed messages"
                );
                return report;
            }
        };
        report.candidates = candidates.len();

        for candidate in candidates {
            if shutdown.is_cancelled() {
                break;
            }

            let message_id = candidate.message_id;
            let status = match self.store.get_delivery_status(message_id).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(
                        worker_id = %self.worker_id,
                        message_id = %message_id,
                        error = %e,
                        "Failed to fetch delivery status"
                    );
                    report.failed += 1;
                    continue;
                }
            };

            let decision = evaluate(&status, now, self.max_retries);
            if decision != RetryDecision::Due {
                tracing::trace!(
                    worker_id = %self.worker_id,
                    message_id = %message_id,
                    attempt_count = status.attempt_count,
                    decision = ?decision,
                    "Skipping retry candidate"
                );
                report.skipped += 1;
                continue;
            }

            match self.service.retry_failed_email(message_id).await {
                Ok(()) => {
                    tracing::info!(
                        worker_id = %self.worker_id,
                        message_id = %message_id,
                        attempt_count = status.attempt_count,
                        "Retried failed email"
                    );
                    report.retried += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        worker_id = %self.worker_id,
                        message_id = %message_id,
                        attempt_count = status.attempt_count,
                        error = %e,
                        "Retry attempt failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}
