//! Failure classification and dead-letter routing.
//!
//! Every dispatch failure lands in exactly one [`ErrorClass`]. Only
//! validation failures are permanent; everything else is left for the retry
//! scanner, which picks the message up again through the status store once
//! the delivery subsystem has scheduled its next attempt.

use std::sync::Arc;

use chrono::Utc;

use mailflow_common::types::{DeadLetterReason, DeadLetterRecord, EmailSendRequest};

use crate::error::DeliveryError;
use crate::service::DeadLetterSink;

/// Outcome category of a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient infrastructure problem.
    Dependency,
    /// Malformed input; retrying cannot help.
    Validation,
    /// Provider back-pressure.
    RateLimit,
    Unknown,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Dependency => write!(f, "dependency"),
            ErrorClass::Validation => write!(f, "validation"),
            ErrorClass::RateLimit => write!(f, "rate_limit"),
            ErrorClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify a collaborator failure. Total: anything unrecognised is `Unknown`.
pub fn classify(error: &DeliveryError) -> ErrorClass {
    match error {
        DeliveryError::Validation(_) => ErrorClass::Validation,
        DeliveryError::RateLimited { .. } => ErrorClass::RateLimit,
        DeliveryError::Dependency(_) | DeliveryError::Redis(_) => ErrorClass::Dependency,
        DeliveryError::Database(sqlx::Error::RowNotFound) => ErrorClass::Unknown,
        DeliveryError::Database(_) => ErrorClass::Dependency,
        DeliveryError::Http(e) => classify_http(e),
        DeliveryError::NotFound(_)
        | DeliveryError::Serialization(_)
        | DeliveryError::Other(_) => ErrorClass::Unknown,
    }
}

fn classify_http(error: &reqwest::Error) -> ErrorClass {
    match error.status() {
        Some(status) if status == reqwest::StatusCode::TOO_MANY_REQUESTS => ErrorClass::RateLimit,
        Some(status) if status.is_server_error() => ErrorClass::Dependency,
        Some(_) => ErrorClass::Unknown,
        None if error.is_connect() || error.is_timeout() || error.is_request() => {
            ErrorClass::Dependency
        }
        None => ErrorClass::Unknown,
    }
}

/// Where a failed request went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Nothing emitted; the status store drives the next attempt.
    LeftForRetry(ErrorClass),
    DeadLettered,
}

/// Applies the classification policy and publishes dead-letter records.
#[derive(Clone)]
pub struct FailureRouter {
    worker_id: String,
    sink: Arc<dyn DeadLetterSink>,
}

impl FailureRouter {
    pub fn new(worker_id: impl Into<String>, sink: Arc<dyn DeadLetterSink>) -> Self {
        Self {
            worker_id: worker_id.into(),
            sink,
        }
    }

    /// Route a dispatch failure. Never fails: sink errors are logged.
    pub async fn route(&self, request: &EmailSendRequest, error: &DeliveryError) -> Routing {
        let class = classify(error);

        match class {
            ErrorClass::Validation => {
                self.dead_letter(request, error, DeadLetterReason::ValidationFailed)
                    .await;
                Routing::DeadLettered
            }
            ErrorClass::Dependency | ErrorClass::RateLimit => {
                tracing::warn!(
                    worker_id = %self.worker_id,
                    correlation_id = %request.correlation_id,
                    class = %class,
                    error = %error,
                    "Transient delivery failure, leaving for retry"
                );
                Routing::LeftForRetry(class)
            }
            ErrorClass::Unknown => {
                tracing::error!(
                    worker_id = %self.worker_id,
                    correlation_id = %request.correlation_id,
                    error = %error,
                    "Unclassified delivery failure, leaving for retry"
                );
                Routing::LeftForRetry(class)
            }
        }
    }

    async fn dead_letter(
        &self,
        request: &EmailSendRequest,
        error: &DeliveryError,
        reason: DeadLetterReason,
    ) {
        let record = DeadLetterRecord {
            request: request.clone(),
            error: error.to_string(),
            failed_at: Utc::now(),
            worker_id: self.worker_id.clone(),
            reason,
        };

        match self.sink.publish(&record).await {
            Ok(()) => tracing::warn!(
                worker_id = %self.worker_id,
                correlation_id = %request.correlation_id,
                reason = %reason,
                error = %record.error,
                "Request moved to dead-letter sink"
            ),
            Err(e) => tracing::error!(
                worker_id = %self.worker_id,
                correlation_id = %request.correlation_id,
                reason = %reason,
                error = %record.error,
                sink_error = %e,
                record = %serde_json::to_string(&record).unwrap_or_default(),
                "Failed to publish dead-letter record"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailflow_common::types::Priority;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<DeadLetterRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl DeadLetterSink for RecordingSink {
        async fn publish(&self, record: &DeadLetterRecord) -> Result<(), DeliveryError> {
            self.records.lock().unwrap().push(record.clone());
            if self.fail {
                return Err(DeliveryError::Dependency("sink offline".to_string()));
            }
            Ok(())
        }
    }

    fn request() -> EmailSendRequest {
        EmailSendRequest::new(
            Uuid::new_v4(),
            "invoice_ready",
            Priority::Normal,
            vec!["billing@example.com".to_string()],
        )
    }

    #[test]
    fn test_classify_structured_kinds() {
        assert_eq!(
            classify(&DeliveryError::Validation("bad address".into())),
            ErrorClass::Validation
        );
        assert_eq!(
            classify(&DeliveryError::RateLimited {
                message: "slow down".into(),
                retry_after: Some(Duration::from_secs(30)),
            }),
            ErrorClass::RateLimit
        );
        assert_eq!(
            classify(&DeliveryError::Dependency("smtp relay down".into())),
            ErrorClass::Dependency
        );
        assert_eq!(
            classify(&DeliveryError::Database(sqlx::Error::PoolTimedOut)),
            ErrorClass::Dependency
        );
        assert_eq!(
            classify(&DeliveryError::Other("???".into())),
            ErrorClass::Unknown
        );
        assert_eq!(
            classify(&DeliveryError::NotFound("message".into())),
            ErrorClass::Unknown
        );
    }

    #[tokio::test]
    async fn test_validation_failure_dead_letters_once() {
        let sink = Arc::new(RecordingSink::default());
        let router = FailureRouter::new("worker-1", sink.clone());
        let request = request();

        let routing = router
            .route(&request, &DeliveryError::Validation("no recipients".into()))
            .await;

        assert_eq!(routing, Routing::DeadLettered);
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].request, request);
        assert_eq!(records[0].worker_id, "worker-1");
        assert_eq!(records[0].reason, DeadLetterReason::ValidationFailed);
        assert!(records[0].error.contains("no recipients"));
    }

    #[tokio::test]
    async fn test_transient_failures_produce_no_dead_letter() {
        let sink = Arc::new(RecordingSink::default());
        let router = FailureRouter::new("worker-1", sink.clone());

        let dependency = router
            .route(&request(), &DeliveryError::Dependency("timeout".into()))
            .await;
        let rate_limited = router
            .route(
                &request(),
                &DeliveryError::RateLimited {
                    message: "429".into(),
                    retry_after: None,
                },
            )
            .await;
        let unknown = router.route(&request(), &DeliveryError::Other("odd".into())).await;

        assert_eq!(dependency, Routing::LeftForRetry(ErrorClass::Dependency));
        assert_eq!(rate_limited, Routing::LeftForRetry(ErrorClass::RateLimit));
        assert_eq!(unknown, Routing::LeftForRetry(ErrorClass::Unknown));
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_propagate() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let router = FailureRouter::new("worker-1", sink.clone());

        let routing = router
            .route(&request(), &DeliveryError::Validation("bad".into()))
            .await;

        assert_eq!(routing, Routing::DeadLettered);
        assert_eq!(sink.records.lock().unwrap().len(), 1);
    }
}
