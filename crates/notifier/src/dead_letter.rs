//! Redis list dead-letter sink.
//!
//! Records are pushed as JSON to the head of a list which is trimmed to a
//! fixed length, so the newest `max_len` records are always retained.

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use mailflow_common::types::DeadLetterRecord;

use crate::error::DeliveryError;
use crate::service::DeadLetterSink;

pub struct RedisDeadLetterSink {
    redis: ConnectionManager,
    key: String,
    max_len: usize,
}

impl RedisDeadLetterSink {
    pub fn new(redis: ConnectionManager, key: impl Into<String>, max_len: usize) -> Self {
        Self {
            redis,
            key: key.into(),
            max_len: max_len.max(1),
        }
    }
}

#[async_trait]
impl DeadLetterSink for RedisDeadLetterSink {
    async fn publish(&self, record: &DeadLetterRecord) -> Result<(), DeliveryError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.redis.clone();

        // LPUSH + LTRIM in one MULTI so the list never exceeds max_len
        let _: () = redis::pipe()
            .atomic()
            .cmd("LPUSH")
            .arg(&self.key)
            .arg(payload)
            .ignore()
            .cmd("LTRIM")
            .arg(&self.key)
            .arg(0)
            .arg(self.max_len as isize - 1)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }
}
