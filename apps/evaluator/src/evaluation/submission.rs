use thiserror::Error;
use tracing::{error, info};

use crate::models::{EvaluationRecord, EvaluationStatus};
use crate::queue::{JobDescriptor, JobQueue, QueueError};
use crate::store::{EvaluationStore, StoreError};

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("evaluation {evaluation_id} could not be queued: {source}")]
    Publish {
        evaluation_id: i64,
        source: QueueError,
    },
}

/// Creates a `queued` evaluation for an existing upload and job spec and hands it
/// to the worker through the queue.
///
/// When the publish fails the record is marked `failed` before returning, so it
/// never sits in `queued` with no message behind it.
pub async fn create_evaluation(
    store: &dyn EvaluationStore,
    queue: &dyn JobQueue,
    upload_id: i64,
    job_id: i64,
) -> Result<EvaluationRecord, SubmissionError> {
    store.get_upload(upload_id).await?;
    store.get_job_spec(job_id).await?;

    let record = store.create_evaluation(upload_id, job_id).await?;

    let descriptor = JobDescriptor {
        evaluation_id: record.id,
        upload_id,
        job_id,
    };

    if let Err(e) = queue.publish(&descriptor).await {
        error!(evaluation_id = record.id, error = %e, "Failed to queue evaluation");
        if let Err(mark_err) = store
            .update_status(record.id, EvaluationStatus::Failed)
            .await
        {
            error!(evaluation_id = record.id, error = %mark_err, "Could not mark evaluation failed");
        }
        return Err(SubmissionError::Publish {
            evaluation_id: record.id,
            source: e,
        });
    }

    info!(evaluation_id = record.id, upload_id, job_id, "Evaluation queued");
    Ok(record)
}
