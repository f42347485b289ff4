//! PostgreSQL-backed delivery status store.
//!
//! Reads the `email_deliveries` table maintained by the delivery subsystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use mailflow_common::types::{DeliveryState, DeliveryStatus, FailedMessage};

use crate::error::DeliveryError;
use crate::service::DeliveryStore;

pub struct PgDeliveryStore {
    pool: PgPool,
}

impl PgDeliveryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryStore for PgDeliveryStore {
    /// Failed messages, soonest retry first. Unscheduled rows sort last.
    async fn get_failed_messages(&self, limit: u32) -> Result<Vec<FailedMessage>, DeliveryError> {
        let rows = sqlx::query_as::<_, FailedMessage>(
            r#"
            SELECT message_id, attempt_count, last_error, updated_at
            FROM email_deliveries
            WHERE state = 'failed'
            ORDER BY next_retry_at ASC NULLS LAST, updated_at ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get_delivery_status(&self, message_id: Uuid) -> Result<DeliveryStatus, DeliveryError> {
        let row: Option<(Uuid, i32, Option<DateTime<Utc>>, String)> = sqlx::query_as(
            r#"
            SELECT message_id, attempt_count, next_retry_at, state
            FROM email_deliveries
            WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        let (message_id, attempt_count, next_retry_at, state) = row.ok_or_else(|| {
            DeliveryError::NotFound(format!("Delivery status for {} not found", message_id))
        })?;

        Ok(DeliveryStatus {
            message_id,
            attempt_count,
            next_retry_at,
            state: state.parse::<DeliveryState>().map_err(DeliveryError::Other)?,
        })
    }
}
