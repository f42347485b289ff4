use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Relative importance of an email-send request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// A queued request to send one email event to a list of recipients.
///
/// Immutable once enqueued. `correlation_id` doubles as the message identifier
/// used by the delivery subsystem and the status store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSendRequest {
    pub subscriber_id: Uuid,
    pub event_type: String,
    pub priority: Priority,
    /// Recipients in delivery order
    pub recipients: Vec<String>,
    /// Opaque template data, passed through untouched
    pub event_data: HashMap<String, serde_json::Value>,
    /// Earliest time the delivery subsystem should send, if any
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub correlation_id: Uuid,
}

impl EmailSendRequest {
    /// Build a request stamped with the current time and a fresh correlation id.
    pub fn new(
        subscriber_id: Uuid,
        event_type: impl Into<String>,
        priority: Priority,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            subscriber_id,
            event_type: event_type.into(),
            priority,
            recipients,
            event_data: HashMap::new(),
            scheduled_at: None,
            created_at: Utc::now(),
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn with_event_data(mut self, event_data: HashMap<String, serde_json::Value>) -> Self {
        self.event_data = event_data;
        self
    }

    pub fn with_schedule(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(scheduled_at);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// Delivery state of a message as tracked by the status store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Sent,
    Failed,
    Dead,
}

impl DeliveryState {
    /// Sent and dead messages never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryState::Sent | DeliveryState::Dead)
    }
}

impl std::str::FromStr for DeliveryState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryState::Pending),
            "sent" => Ok(DeliveryState::Sent),
            "failed" => Ok(DeliveryState::Failed),
            "dead" => Ok(DeliveryState::Dead),
            other => Err(format!("unknown delivery state: {}", other)),
        }
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryState::Pending => write!(f, "pending"),
            DeliveryState::Sent => write!(f, "sent"),
            DeliveryState::Failed => write!(f, "failed"),
            DeliveryState::Dead => write!(f, "dead"),
        }
    }
}

/// Current delivery status of one message, owned by the external store.
///
/// `attempt_count` only increases; `next_retry_at` is written by the delivery
/// subsystem after each failed attempt, never by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub message_id: Uuid,
    pub attempt_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub state: DeliveryState,
}

/// A failed-message record as listed by the store for retry scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FailedMessage {
    pub message_id: Uuid,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Point-in-time worker snapshot. Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    pub worker_id: String,
    pub active: bool,
    pub queue_length: usize,
    pub queue_capacity: usize,
}

/// Why a request ended up in the dead-letter sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// The delivery subsystem rejected the request as malformed.
    ValidationFailed,
    /// Every allowed attempt failed.
    RetriesExhausted,
}

impl std::fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeadLetterReason::ValidationFailed => write!(f, "validation_failed"),
            DeadLetterReason::RetriesExhausted => write!(f, "retries_exhausted"),
        }
    }
}

/// Terminal record of a request that must not be retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub request: EmailSendRequest,
    pub error: String,
    pub failed_at: DateTime<Utc>,
    pub worker_id: String,
    pub reason: DeadLetterReason,
}
