//! Worker lifecycle: start, stop, admission and metrics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mailflow_common::types::{EmailSendRequest, WorkerMetrics};

use crate::classifier::FailureRouter;
use crate::config::WorkerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::WorkerError;
use crate::maintenance::MaintenanceReporter;
use crate::queue::RequestQueue;
use crate::retry::RetryScanner;
use crate::service::{DeadLetterSink, DeliveryService, DeliveryStore};

/// Handles of one started run.
struct RunningLoops {
    shutdown: CancellationToken,
    dispatcher: JoinHandle<()>,
    scanner: JoinHandle<()>,
}

impl RunningLoops {
    fn is_finished(&self) -> bool {
        self.dispatcher.is_finished() && self.scanner.is_finished()
    }
}

/// A single email worker: one bounded queue, one dispatcher, one retry scanner.
pub struct EmailWorker {
    config: WorkerConfig,
    queue: Arc<RequestQueue>,
    service: Arc<dyn DeliveryService>,
    store: Arc<dyn DeliveryStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    active: Arc<AtomicBool>,
    running: Mutex<Option<RunningLoops>>,
}

impl EmailWorker {
    pub fn new(
        config: WorkerConfig,
        service: Arc<dyn DeliveryService>,
        store: Arc<dyn DeliveryStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        let queue = Arc::new(RequestQueue::new(config.queue_capacity));
        Self {
            config,
            queue,
            service,
            store,
            dead_letters,
            active: Arc::new(AtomicBool::new(false)),
            running: Mutex::new(None),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Mark the worker active and spawn the dispatcher and retry scanner.
    ///
    /// Returns immediately. Both loops stop when `upstream` is cancelled or
    /// [`stop`](Self::stop) is called. Must be called inside a Tokio runtime.
    pub fn start(&self, upstream: &CancellationToken) -> Result<(), WorkerError> {
        let mut running = self.running();

        if let Some(loops) = running.as_ref() {
            if !loops.is_finished() {
                return Err(WorkerError::AlreadyRunning);
            }
            tracing::debug!(worker_id = %self.worker_id(), "Reaping loops from previous run");
        }

        let shutdown = upstream.child_token();
        self.active.store(true, Ordering::SeqCst);

        let dispatcher = self.build_dispatcher();
        let scanner = self.build_scanner();

        let dispatcher = tokio::spawn(dispatcher.run(shutdown.clone(), upstream.clone()));
        let scanner = tokio::spawn(scanner.run(shutdown.clone()));

        *running = Some(RunningLoops {
            shutdown,
            dispatcher,
            scanner,
        });

        tracing::info!(
            worker_id = %self.worker_id(),
            queue_capacity = self.queue.capacity(),
            max_retries = self.config.max_retries,
            "Email worker started"
        );
        Ok(())
    }

    /// Signal both loops to exit and wait for them up to the grace period.
    ///
    /// Best effort: on timeout a warning is logged and `Ok` is returned with
    /// the loops left to finish on their own. Safe to call repeatedly or on a
    /// worker that never started.
    pub async fn stop(&self) -> Result<(), WorkerError> {
        // Taking the handles means a restart after a timed-out stop spawns
        // fresh loops beside the detached ones. The old dispatcher still holds
        // the receiver, so the new one waits on that lock until it exits.
        let loops = {
            let mut running = self.running();
            self.active.store(false, Ordering::SeqCst);
            running.take()
        };

        let Some(loops) = loops else {
            tracing::debug!(worker_id = %self.worker_id(), "Stop called on idle worker");
            return Ok(());
        };

        loops.shutdown.cancel();

        let grace = self.config.shutdown_grace;
        let joined = tokio::time::timeout(grace, async {
            let (dispatcher, scanner) = tokio::join!(loops.dispatcher, loops.scanner);
            for result in [dispatcher, scanner] {
                if let Err(e) = result {
                    tracing::error!(worker_id = %self.worker_id(), error = %e, "Worker loop panicked");
                }
            }
        })
        .await;

        match joined {
            Ok(()) => tracing::info!(worker_id = %self.worker_id(), "Email worker stopped"),
            Err(_) => tracing::warn!(
                worker_id = %self.worker_id(),
                grace_secs = grace.as_secs(),
                "Worker loops did not exit within the grace period"
            ),
        }

        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Admit a request into the queue.
    ///
    /// Fails immediately with [`WorkerError::Inactive`] when the worker is not
    /// running. On a full queue waits up to the enqueue timeout, or until the
    /// worker is stopped, whichever comes first.
    pub async fn queue_email(&self, request: EmailSendRequest) -> Result<(), WorkerError> {
        let shutdown = {
            let running = self.running();
            match running.as_ref() {
                Some(loops) if self.is_active() && !loops.shutdown.is_cancelled() => {
                    loops.shutdown.clone()
                }
                _ => return Err(WorkerError::Inactive),
            }
        };

        let correlation_id = request.correlation_id;
        // The dispatcher stops draining once the token fires, so a cancelled
        // token must win over a free slot.
        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(WorkerError::Inactive),
            result = self.queue.push(request, self.config.enqueue_timeout) => result,
        };

        match &result {
            Ok(()) => tracing::debug!(
                worker_id = %self.worker_id(),
                correlation_id = %correlation_id,
                queue_length = self.queue.len(),
                "Email request queued"
            ),
            Err(e) => tracing::warn!(
                worker_id = %self.worker_id(),
                correlation_id = %correlation_id,
                error = %e,
                "Email request rejected"
            ),
        }

        result
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> WorkerMetrics {
        WorkerMetrics {
            worker_id: self.config.worker_id.clone(),
            active: self.is_active(),
            queue_length: self.queue.len(),
            queue_capacity: self.queue.capacity(),
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<RunningLoops>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_dispatcher(&self) -> Dispatcher {
        let worker_id = self.worker_id().to_string();
        Dispatcher::new(
            worker_id.clone(),
            self.queue.clone(),
            self.service.clone(),
            FailureRouter::new(worker_id.clone(), self.dead_letters.clone()),
            MaintenanceReporter::new(worker_id, self.queue.clone(), self.service.clone()),
            self.config.processing_delay,
            self.config.idle_interval,
            self.active.clone(),
        )
    }

    fn build_scanner(&self) -> RetryScanner {
        RetryScanner::new(
            self.worker_id(),
            self.service.clone(),
            self.store.clone(),
            self.config.max_retries,
            self.config.retry_batch_size,
            self.config.retry_scan_interval,
        )
    }
}
