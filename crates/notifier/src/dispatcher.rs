//! Main processing loop.
//!
//! Multiplexes the stop signal, the request queue and an idle timer. Requests
//! are dispatched strictly one at a time: the loop does not return to the
//! `select!` until the current request has been delivered or routed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use mailflow_common::types::EmailSendRequest;

use crate::classifier::{FailureRouter, Routing};
use crate::config::MIN_LOOP_INTERVAL;
use crate::maintenance::MaintenanceReporter;
use crate::queue::RequestQueue;
use crate::service::DeliveryService;

/// Result of handling one dequeued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Failed(Routing),
    /// Cancelled during the processing delay, before any delivery attempt.
    Aborted,
}

pub struct Dispatcher {
    worker_id: String,
    queue: Arc<RequestQueue>,
    service: Arc<dyn DeliveryService>,
    router: FailureRouter,
    reporter: MaintenanceReporter,
    processing_delay: Option<Duration>,
    idle_interval: Duration,
    active: Arc<AtomicBool>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_id: impl Into<String>,
        queue: Arc<RequestQueue>,
        service: Arc<dyn DeliveryService>,
        router: FailureRouter,
        reporter: MaintenanceReporter,
        processing_delay: Option<Duration>,
        idle_interval: Duration,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue,
            service,
            router,
            reporter,
            processing_delay,
            idle_interval: idle_interval.max(MIN_LOOP_INTERVAL),
            active,
        }
    }

    /// Run until `shutdown` fires.
    ///
    /// `shutdown` is a child of `upstream`; `upstream` is only consulted to
    /// tell an external cancellation from a local stop.
    pub async fn run(self, shutdown: CancellationToken, upstream: CancellationToken) {
        let queue = Arc::clone(&self.queue);

        let mut receiver = tokio::select! {
            guard = queue.lock_receiver() => guard,
            _ = shutdown.cancelled() => {
                self.exit(&upstream);
                return;
            }
        };

        tracing::info!(worker_id = %self.worker_id, "Dispatcher started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(request) => {
                        self.process_request(request, &shutdown).await;
                    }
                    None => {
                        tracing::warn!(worker_id = %self.worker_id, "Request queue closed");
                        break;
                    }
                },
                _ = tokio::time::sleep(self.idle_interval) => {
                    self.reporter.report().await;
                }
            }
        }

        self.exit(&upstream);
    }

    fn exit(&self, upstream: &CancellationToken) {
        if upstream.is_cancelled() {
            self.active.store(false, Ordering::SeqCst);
            tracing::info!(worker_id = %self.worker_id, "Dispatcher cancelled upstream, exiting");
        } else {
            tracing::info!(worker_id = %self.worker_id, "Dispatcher received stop signal, exiting");
        }
    }

    /// Deliver one request and route its failure, if any.
    pub async fn process_request(
        &self,
        request: EmailSendRequest,
        shutdown: &CancellationToken,
    ) -> DispatchOutcome {
        if let Some(delay) = self.processing_delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    tracing::debug!(
                        worker_id = %self.worker_id,
                        correlation_id = %request.correlation_id,
                        "Cancelled during processing delay, request not dispatched"
                    );
                    return DispatchOutcome::Aborted;
                }
            }
        }

        let started = Instant::now();
        let result = self.service.process_email_request(&request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                tracing::info!(
                    worker_id = %self.worker_id,
                    correlation_id = %request.correlation_id,
                    event_type = %request.event_type,
                    recipients = request.recipients.len(),
                    elapsed_ms,
                    "Email request processed"
                );
                DispatchOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    worker_id = %self.worker_id,
                    correlation_id = %request.correlation_id,
                    event_type = %request.event_type,
                    elapsed_ms,
                    error = %e,
                    "Email request failed"
                );
                DispatchOutcome::Failed(self.router.route(&request, &e).await)
            }
        }
    }
}
