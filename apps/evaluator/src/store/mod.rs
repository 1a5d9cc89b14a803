//! Evaluation Record Store: durable home of job specs, uploads and evaluation records.
//!
//! The Worker is the only writer of evaluation status after submission. Transitions are
//! validated here so a redelivered or stale message can never move a record backwards.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::evaluation::EvaluationOutcome;
use crate::models::{EvaluationRecord, EvaluationStatus, JobSpec, NewUpload, UploadRecord};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("evaluation {id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        id: i64,
        from: EvaluationStatus,
        to: EvaluationStatus,
    },

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn get_job_spec(&self, id: i64) -> Result<JobSpec, StoreError>;

    async fn create_upload(&self, upload: NewUpload) -> Result<UploadRecord, StoreError>;

    async fn get_upload(&self, id: i64) -> Result<UploadRecord, StoreError>;

    /// Inserts a new record in `queued`.
    async fn create_evaluation(
        &self,
        upload_id: i64,
        job_id: i64,
    ) -> Result<EvaluationRecord, StoreError>;

    async fn get_evaluation(&self, id: i64) -> Result<EvaluationRecord, StoreError>;

    /// Moves a record to `status`. Fails with `InvalidTransition` when the
    /// current status is not a legal predecessor; the record is left untouched.
    async fn update_status(&self, id: i64, status: EvaluationStatus) -> Result<(), StoreError>;

    /// Writes the scored fields plus the raw payload and marks the record `completed`.
    async fn complete(
        &self,
        id: i64,
        outcome: &EvaluationOutcome,
        raw: &serde_json::Value,
    ) -> Result<(), StoreError>;
}
