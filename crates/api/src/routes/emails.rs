//! Email enqueue route.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mailflow_common::error::AppError;
use mailflow_common::types::{EmailSendRequest, Priority};
use mailflow_notifier::WorkerError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/emails", post(queue_email))
}

/// Body of `POST /api/emails`.
#[derive(Debug, Deserialize)]
pub struct QueueEmailParams {
    pub subscriber_id: Uuid,
    pub event_type: String,
    #[serde(default)]
    pub priority: Priority,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub event_data: HashMap<String, serde_json::Value>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Supplied by callers that trace requests end to end; generated otherwise.
    pub correlation_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedEmail {
    pub correlation_id: Uuid,
    pub queue_length: usize,
}

impl QueueEmailParams {
    fn into_request(self) -> Result<EmailSendRequest, AppError> {
        if self.recipients.is_empty() {
            return Err(AppError::Validation(
                "At least one recipient is required".to_string(),
            ));
        }
        if self.event_type.trim().is_empty() {
            return Err(AppError::Validation("event_type must not be empty".to_string()));
        }

        let mut request =
            EmailSendRequest::new(self.subscriber_id, self.event_type, self.priority, self.recipients)
                .with_event_data(self.event_data);
        if let Some(scheduled_at) = self.scheduled_at {
            request = request.with_schedule(scheduled_at);
        }
        if let Some(correlation_id) = self.correlation_id {
            request = request.with_correlation_id(correlation_id);
        }
        Ok(request)
    }
}

/// POST /api/emails: admit a request into the worker queue.
async fn queue_email(
    State(state): State<AppState>,
    Json(params): Json<QueueEmailParams>,
) -> Result<(StatusCode, Json<QueuedEmail>), AppError> {
    let request = params.into_request()?;
    let correlation_id = request.correlation_id;

    state
        .worker
        .queue_email(request)
        .await
        .map_err(|e| match e {
            WorkerError::Inactive => AppError::Unavailable(e.to_string()),
            WorkerError::QueueFull { .. } => AppError::Backpressure(e.to_string()),
            WorkerError::AlreadyRunning => AppError::Internal(e.to_string()),
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedEmail {
            correlation_id,
            queue_length: state.worker.queue_length(),
        }),
    ))
}
