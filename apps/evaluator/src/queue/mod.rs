//! Job Queue: durable FIFO channel between submission and the evaluation worker.
//!
//! Messages carry ids only. The worker re-reads document text from the store so the
//! broker never holds large or stale payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
pub mod memory;
pub mod redis_queue;

pub use redis_queue::RedisJobQueue;

pub const DEFAULT_QUEUE_NAME: &str = "evaluation_queue";

/// Wire message: `{"evaluation_id":42,"upload_id":7,"job_id":2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub evaluation_id: i64,
    pub upload_id: i64,
    pub job_id: i64,
}

impl JobDescriptor {
    pub fn encode(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(QueueError::Encode)
    }

    pub fn decode(body: &str) -> Result<Self, QueueError> {
        serde_json::from_str(body).map_err(|e| QueueError::Decode {
            body: body.to_string(),
            source: e,
        })
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("broker error: {0}")]
    Broker(#[from] redis::RedisError),

    #[error("broker did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("failed to encode job descriptor: {0}")]
    Encode(serde_json::Error),

    #[error("invalid job message {body:?}: {source}")]
    Decode {
        body: String,
        source: serde_json::Error,
    },

    #[error("queue closed")]
    Closed,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues durably. Bounded in time: an unreachable broker yields an error
    /// rather than a hang.
    async fn publish(&self, job: &JobDescriptor) -> Result<(), QueueError>;

    /// Takes the next message, acknowledging it on delivery. `Ok(None)` means the
    /// poll window elapsed with nothing to deliver.
    async fn receive(&self) -> Result<Option<JobDescriptor>, QueueError>;
}
