//! HTTP client for the delivery subsystem.
//!
//! Endpoints:
//! - `POST /v1/emails`: submit a queued request
//! - `POST /v1/emails/{message_id}/retry`: re-attempt a failed message
//! - `GET  /health`: provider health
//!
//! Non-success responses are mapped onto [`DeliveryError`] variants so the
//! classifier can tell permanent failures from transient ones.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use uuid::Uuid;

use mailflow_common::types::EmailSendRequest;

use crate::error::DeliveryError;
use crate::service::DeliveryService;

pub struct HttpDeliveryService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDeliveryService {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl DeliveryService for HttpDeliveryService {
    async fn process_email_request(&self, request: &EmailSendRequest) -> Result<(), DeliveryError> {
        let response = self
            .authorize(self.client.post(self.url("/v1/emails")))
            .header("X-Correlation-Id", request.correlation_id.to_string())
            .json(request)
            .send()
            .await?;

        check_response(response).await
    }

    async fn retry_failed_email(&self, message_id: Uuid) -> Result<(), DeliveryError> {
        let response = self
            .authorize(
                self.client
                    .post(self.url(&format!("/v1/emails/{}/retry", message_id))),
            )
            .header("X-Correlation-Id", message_id.to_string())
            .send()
            .await?;

        check_response(response).await
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        let response = self
            .authorize(self.client.get(self.url("/health")))
            .send()
            .await?;

        check_response(response).await
    }
}

/// Map a delivery-subsystem response onto the error taxonomy.
async fn check_response(response: Response) -> Result<(), DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    let body = response.text().await.unwrap_or_default();
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        body
    };

    Err(match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            DeliveryError::Validation(detail)
        }
        StatusCode::NOT_FOUND => DeliveryError::NotFound(detail),
        StatusCode::TOO_MANY_REQUESTS => DeliveryError::RateLimited {
            message: detail,
            retry_after,
        },
        s if s.is_server_error() => DeliveryError::Dependency(format!("{}: {}", s, detail)),
        s => DeliveryError::Other(format!("Unexpected status {}: {}", s, detail)),
    })
}
