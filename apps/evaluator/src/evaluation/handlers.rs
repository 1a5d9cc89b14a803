//! Axum route handlers for submitting and polling evaluations.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::evaluation::submission::create_evaluation;
use crate::models::evaluation::EvaluationOutcome;
use crate::models::{EvaluationRecord, EvaluationStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub upload_id: i64,
    pub job_id: i64,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub id: i64,
    pub status: EvaluationStatus,
}

/// Polling view. `result` is present only once the record is `completed`.
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub id: i64,
    pub status: EvaluationStatus,
    pub upload_id: i64,
    pub job_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<EvaluationOutcome>,
}

impl From<EvaluationRecord> for ResultResponse {
    fn from(record: EvaluationRecord) -> Self {
        let result = match record.status {
            EvaluationStatus::Completed => record.outcome,
            _ => None,
        };
        Self {
            id: record.id,
            status: record.status,
            upload_id: record.upload_id,
            job_id: record.job_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            result,
        }
    }
}

/// POST /evaluate
///
/// Queues an evaluation and returns immediately with status `queued`.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let record = create_evaluation(
        state.store.as_ref(),
        state.queue.as_ref(),
        request.upload_id,
        request.job_id,
    )
    .await?;

    Ok(Json(EvaluateResponse {
        id: record.id,
        status: record.status,
    }))
}

/// GET /result/:id
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ResultResponse>, AppError> {
    let record = state.store.get_evaluation(id).await?;
    Ok(Json(record.into()))
}
