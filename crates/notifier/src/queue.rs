//! Bounded FIFO request queue with timed admission.
//!
//! Producers push through a cloned `mpsc::Sender`; the single dispatcher pulls
//! from the receiver, which lives behind an async mutex so a restarted worker
//! can pick it up again once the previous dispatcher has let go.

use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, MutexGuard, mpsc};

use mailflow_common::types::EmailSendRequest;

use crate::error::WorkerError;

pub struct RequestQueue {
    sender: mpsc::Sender<EmailSendRequest>,
    receiver: Mutex<mpsc::Receiver<EmailSendRequest>>,
    capacity: usize,
}

impl RequestQueue {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current occupancy, including slots reserved by in-flight pushes.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupancy as a fraction of capacity, in `0.0..=1.0`.
    pub fn utilization(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }

    /// Append a request, waiting up to `timeout` for a free slot.
    ///
    /// Cancel safe: dropping the future before it resolves leaves the queue
    /// untouched.
    pub async fn push(
        &self,
        request: EmailSendRequest,
        timeout: Duration,
    ) -> Result<(), WorkerError> {
        let request = match self.sender.try_send(request) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(request)) => request,
            Err(TrySendError::Closed(_)) => return Err(WorkerError::Inactive),
        };

        match tokio::time::timeout(timeout, self.sender.send(request)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(WorkerError::Inactive),
            Err(_) => Err(WorkerError::QueueFull { timeout }),
        }
    }

    /// Exclusive access to the consuming end.
    pub(crate) async fn lock_receiver(&self) -> MutexGuard<'_, mpsc::Receiver<EmailSendRequest>> {
        self.receiver.lock().await
    }
}
