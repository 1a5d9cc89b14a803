use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{EvaluationStore, StoreError};
use crate::models::evaluation::{EvaluationOutcome, EvaluationRow};
use crate::models::{EvaluationRecord, EvaluationStatus, JobSpec, NewUpload, UploadRecord};

const EVALUATION_COLUMNS: &str = "id, upload_id, job_id, status, cv_match_rate, cv_feedback, \
     project_score, project_feedback, overall_summary, result_json, created_at, updated_at";

/// PostgreSQL-backed store. Every write is a single statement keyed by id;
/// there is no transaction spanning a worker's load + score + update.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolves why a guarded UPDATE touched no rows.
    async fn transition_rejected(&self, id: i64, to: EvaluationStatus) -> StoreError {
        match self.get_evaluation(id).await {
            Ok(current) => StoreError::InvalidTransition {
                id,
                from: current.status,
                to,
            },
            Err(e) => e,
        }
    }
}

fn predecessor_names(status: EvaluationStatus) -> Vec<String> {
    EvaluationStatus::predecessors(status)
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

#[async_trait]
impl EvaluationStore for PgStore {
    async fn get_job_spec(&self, id: i64) -> Result<JobSpec, StoreError> {
        sqlx::query_as::<_, JobSpec>(
            "SELECT id, title, description, rubric, created_at FROM job_specs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "job spec",
            id,
        })
    }

    async fn create_upload(&self, upload: NewUpload) -> Result<UploadRecord, StoreError> {
        let row = sqlx::query_as::<_, UploadRecord>(
            r#"
            INSERT INTO uploads (candidate_name, candidate_email, cv_text, project_text)
            VALUES ($1, $2, $3, $4)
            RETURNING id, candidate_name, candidate_email, cv_text, project_text, created_at
            "#,
        )
        .bind(&upload.candidate_name)
        .bind(&upload.candidate_email)
        .bind(&upload.cv_text)
        .bind(&upload.project_text)
        .fetch_one(&self.pool)
        .await?;

        debug!(upload_id = row.id, "Stored upload");
        Ok(row)
    }

    async fn get_upload(&self, id: i64) -> Result<UploadRecord, StoreError> {
        sqlx::query_as::<_, UploadRecord>(
            "SELECT id, candidate_name, candidate_email, cv_text, project_text, created_at \
             FROM uploads WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "upload",
            id,
        })
    }

    async fn create_evaluation(
        &self,
        upload_id: i64,
        job_id: i64,
    ) -> Result<EvaluationRecord, StoreError> {
        let row = sqlx::query_as::<_, EvaluationRow>(&format!(
            "INSERT INTO evaluations (upload_id, job_id, status) VALUES ($1, $2, $3) \
             RETURNING {EVALUATION_COLUMNS}"
        ))
        .bind(upload_id)
        .bind(job_id)
        .bind(EvaluationStatus::Queued.as_str())
        .fetch_one(&self.pool)
        .await?;

        EvaluationRecord::try_from(row).map_err(StoreError::Corrupt)
    }

    async fn get_evaluation(&self, id: i64) -> Result<EvaluationRecord, StoreError> {
        let row = sqlx::query_as::<_, EvaluationRow>(&format!(
            "SELECT {EVALUATION_COLUMNS} FROM evaluations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "evaluation",
            id,
        })?;

        EvaluationRecord::try_from(row).map_err(StoreError::Corrupt)
    }

    async fn update_status(&self, id: i64, status: EvaluationStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE evaluations
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(predecessor_names(status))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_rejected(id, status).await);
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: i64,
        outcome: &EvaluationOutcome,
        raw: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE evaluations
            SET status = $2,
                cv_match_rate = $3,
                cv_feedback = $4,
                project_score = $5,
                project_feedback = $6,
                overall_summary = $7,
                result_json = $8,
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($9)
            "#,
        )
        .bind(id)
        .bind(EvaluationStatus::Completed.as_str())
        .bind(outcome.cv_match_rate)
        .bind(&outcome.cv_feedback)
        .bind(outcome.project_score)
        .bind(&outcome.project_feedback)
        .bind(&outcome.overall_summary)
        .bind(raw)
        .bind(predecessor_names(EvaluationStatus::Completed))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .transition_rejected(id, EvaluationStatus::Completed)
                .await);
        }
        Ok(())
    }
}
