//! Scriptable fakes for the worker's collaborators.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use uuid::Uuid;

use mailflow_common::types::{
    DeadLetterRecord, DeliveryState, DeliveryStatus, EmailSendRequest, FailedMessage, Priority,
};
use mailflow_notifier::{DeadLetterSink, DeliveryError, DeliveryService, DeliveryStore};

pub fn request(event_type: &str) -> EmailSendRequest {
    EmailSendRequest::new(
        Uuid::new_v4(),
        event_type,
        Priority::Normal,
        vec!["someone@example.com".to_string()],
    )
}

/// Delivery service that records every call and replays scripted results.
#[derive(Default)]
pub struct FakeDelivery {
    script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    /// When set, each delivery waits for a permit before returning.
    gate: Option<Arc<Semaphore>>,
    processed: Mutex<Vec<EmailSendRequest>>,
    retried: Mutex<Vec<Uuid>>,
    retry_failures: Mutex<Vec<Uuid>>,
    health_checks: AtomicUsize,
}

impl FakeDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Result for the next `process_email_request`; unscripted calls succeed.
    pub fn then(self, result: Result<(), DeliveryError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn fail_retry_of(self, message_id: Uuid) -> Self {
        self.retry_failures.lock().unwrap().push(message_id);
        self
    }

    pub fn processed(&self) -> Vec<EmailSendRequest> {
        self.processed.lock().unwrap().clone()
    }

    pub fn retried(&self) -> Vec<Uuid> {
        self.retried.lock().unwrap().clone()
    }

    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryService for FakeDelivery {
    async fn process_email_request(&self, request: &EmailSendRequest) -> Result<(), DeliveryError> {
        self.processed.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn retry_failed_email(&self, message_id: Uuid) -> Result<(), DeliveryError> {
        self.retried.lock().unwrap().push(message_id);
        if self.retry_failures.lock().unwrap().contains(&message_id) {
            return Err(DeliveryError::Dependency("provider timeout".to_string()));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory status store.
#[derive(Default)]
pub struct FakeStore {
    failed: Mutex<Vec<FailedMessage>>,
    statuses: Mutex<HashMap<Uuid, DeliveryStatus>>,
    listing_broken: bool,
    requested_limits: Mutex<Vec<u32>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken() -> Self {
        Self {
            listing_broken: true,
            ..Self::default()
        }
    }

    /// Register a failed message with the given status fields.
    pub fn with_failed(
        self,
        attempt_count: i32,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> (Self, Uuid) {
        let message_id = Uuid::new_v4();
        self.failed.lock().unwrap().push(FailedMessage {
            message_id,
            attempt_count,
            last_error: Some("smtp 451".to_string()),
            updated_at: Utc::now(),
        });
        self.statuses.lock().unwrap().insert(
            message_id,
            DeliveryStatus {
                message_id,
                attempt_count,
                next_retry_at,
                state: DeliveryState::Failed,
            },
        );
        (self, message_id)
    }

    /// A failed message listed by the store whose status lookup fails.
    pub fn with_dangling(self) -> (Self, Uuid) {
        let message_id = Uuid::new_v4();
        self.failed.lock().unwrap().push(FailedMessage {
            message_id,
            attempt_count: 1,
            last_error: None,
            updated_at: Utc::now(),
        });
        (self, message_id)
    }

    pub fn requested_limits(&self) -> Vec<u32> {
        self.requested_limits.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryStore for FakeStore {
    async fn get_failed_messages(&self, limit: u32) -> Result<Vec<FailedMessage>, DeliveryError> {
        self.requested_limits.lock().unwrap().push(limit);
        if self.listing_broken {
            return Err(DeliveryError::Dependency("store offline".to_string()));
        }
        let failed = self.failed.lock().unwrap();
        Ok(failed.iter().take(limit as usize).cloned().collect())
    }

    async fn get_delivery_status(&self, message_id: Uuid) -> Result<DeliveryStatus, DeliveryError> {
        self.statuses
            .lock()
            .unwrap()
            .get(&message_id)
            .cloned()
            .ok_or_else(|| DeliveryError::NotFound(message_id.to_string()))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<DeadLetterRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<DeadLetterRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingSink {
    async fn publish(&self, record: &DeadLetterRecord) -> Result<(), DeliveryError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Poll `condition` until it holds, panicking after `limit` of (tokio) time.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + limit;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {:?}",
            limit
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
