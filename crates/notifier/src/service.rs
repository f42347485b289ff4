//! Interfaces of the worker's external collaborators.

use async_trait::async_trait;
use uuid::Uuid;

use mailflow_common::types::{DeadLetterRecord, DeliveryStatus, EmailSendRequest, FailedMessage};

use crate::error::DeliveryError;

/// The subsystem that renders and transmits emails.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    /// Deliver a freshly queued request.
    async fn process_email_request(&self, request: &EmailSendRequest) -> Result<(), DeliveryError>;

    /// Re-attempt delivery of a previously failed message.
    async fn retry_failed_email(&self, message_id: Uuid) -> Result<(), DeliveryError>;

    async fn health_check(&self) -> Result<(), DeliveryError>;
}

/// Read access to delivery status and attempt history.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn get_failed_messages(&self, limit: u32) -> Result<Vec<FailedMessage>, DeliveryError>;

    async fn get_delivery_status(&self, message_id: Uuid) -> Result<DeliveryStatus, DeliveryError>;
}

/// Durable destination for requests that must never be retried.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(&self, record: &DeadLetterRecord) -> Result<(), DeliveryError>;
}
