//! In-memory store used by unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;

use super::{EvaluationStore, StoreError};
use crate::models::evaluation::EvaluationOutcome;
use crate::models::{
    EvaluationRecord, EvaluationStatus, JobSpec, NewUpload, UploadRecord,
};

#[derive(Default)]
struct Tables {
    job_specs: HashMap<i64, JobSpec>,
    uploads: HashMap<i64, UploadRecord>,
    evaluations: HashMap<i64, EvaluationRecord>,
    next_upload_id: i64,
    next_evaluation_id: i64,
    /// Every status write in order, for asserting the path a record took.
    history: Vec<(i64, EvaluationStatus)>,
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                next_upload_id: 1,
                next_evaluation_id: 1,
                ..Tables::default()
            }),
        }
    }

    pub fn with_next_evaluation_id(self, id: i64) -> Self {
        self.tables.try_write().expect("fresh store").next_evaluation_id = id;
        self
    }

    pub async fn insert_job_spec(&self, id: i64, description: &str, rubric: serde_json::Value) {
        self.tables.write().await.job_specs.insert(
            id,
            JobSpec {
                id,
                title: format!("Job {id}"),
                description: description.to_string(),
                rubric: Json(rubric),
                created_at: Utc::now(),
            },
        );
    }

    pub async fn insert_upload(&self, id: i64, cv_text: &str, project_text: &str) {
        self.tables.write().await.uploads.insert(
            id,
            UploadRecord {
                id,
                candidate_name: "Jane Doe".to_string(),
                candidate_email: "jane@example.com".to_string(),
                cv_text: cv_text.to_string(),
                project_text: project_text.to_string(),
                created_at: Utc::now(),
            },
        );
    }

    pub async fn status_history(&self, id: i64) -> Vec<EvaluationStatus> {
        self.tables
            .read()
            .await
            .history
            .iter()
            .filter(|(eval_id, _)| *eval_id == id)
            .map(|(_, status)| *status)
            .collect()
    }
}

/// Applies a legal transition and records it in the history. The record is left
/// untouched when the transition is rejected.
fn transition(
    tables: &mut Tables,
    id: i64,
    to: EvaluationStatus,
) -> Result<&mut EvaluationRecord, StoreError> {
    let Tables {
        evaluations,
        history,
        ..
    } = tables;
    let record = evaluations.get_mut(&id).ok_or(StoreError::NotFound {
        entity: "evaluation",
        id,
    })?;
    if !record.status.can_transition_to(to) {
        return Err(StoreError::InvalidTransition {
            id,
            from: record.status,
            to,
        });
    }
    record.status = to;
    record.updated_at = Utc::now();
    history.push((id, to));
    Ok(record)
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn get_job_spec(&self, id: i64) -> Result<JobSpec, StoreError> {
        self.tables
            .read()
            .await
            .job_specs
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "job spec",
                id,
            })
    }

    async fn create_upload(&self, upload: NewUpload) -> Result<UploadRecord, StoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_upload_id;
        tables.next_upload_id += 1;
        let record = UploadRecord {
            id,
            candidate_name: upload.candidate_name,
            candidate_email: upload.candidate_email,
            cv_text: upload.cv_text,
            project_text: upload.project_text,
            created_at: Utc::now(),
        };
        tables.uploads.insert(id, record.clone());
        Ok(record)
    }

    async fn get_upload(&self, id: i64) -> Result<UploadRecord, StoreError> {
        self.tables
            .read()
            .await
            .uploads
            .get(&id)
            .cloned()
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
        let mut tables = self.tables.write().await;
        let id = tables.next_evaluation_id;
        tables.next_evaluation_id += 1;
        let now = Utc::now();
        let record = EvaluationRecord {
            id,
            upload_id,
            job_id,
            status: EvaluationStatus::Queued,
            outcome: None,
            result_json: None,
            created_at: now,
            updated_at: now,
        };
        tables.evaluations.insert(id, record.clone());
        tables.history.push((id, EvaluationStatus::Queued));
        Ok(record)
    }

    async fn get_evaluation(&self, id: i64) -> Result<EvaluationRecord, StoreError> {
        self.tables
            .read()
            .await
            .evaluations
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "evaluation",
                id,
            })
    }

    async fn update_status(&self, id: i64, status: EvaluationStatus) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        transition(&mut tables, id, status).map(|_| ())
    }

    async fn complete(
        &self,
        id: i64,
        outcome: &EvaluationOutcome,
        raw: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let record = transition(&mut tables, id, EvaluationStatus::Completed)?;
        record.outcome = Some(outcome.clone());
        record.result_json = Some(raw.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_evaluation_starts_queued() {
        let store = MemoryStore::new().with_next_evaluation_id(42);
        let record = store.create_evaluation(7, 2).await.unwrap();
        assert_eq!(record.id, 42);
        assert_eq!(record.status, EvaluationStatus::Queued);
        assert!(record.outcome.is_none());
    }

    #[tokio::test]
    async fn test_terminal_record_rejects_further_writes() {
        let store = MemoryStore::new();
        let record = store.create_evaluation(1, 1).await.unwrap();
        store
            .update_status(record.id, EvaluationStatus::Processing)
            .await
            .unwrap();
        store
            .update_status(record.id, EvaluationStatus::Failed)
            .await
            .unwrap();

        let err = store
            .update_status(record.id, EvaluationStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: EvaluationStatus::Failed,
                to: EvaluationStatus::Processing,
                ..
            }
        ));
        assert_eq!(
            store.get_evaluation(record.id).await.unwrap().status,
            EvaluationStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_rejected_transition_leaves_history_untouched() {
        let store = MemoryStore::new();
        let record = store.create_evaluation(1, 1).await.unwrap();
        store
            .update_status(record.id, EvaluationStatus::Processing)
            .await
            .unwrap();
        let before = store.get_evaluation(record.id).await.unwrap();

        assert!(store
            .update_status(record.id, EvaluationStatus::Queued)
            .await
            .is_err());

        let after = store.get_evaluation(record.id).await.unwrap();
        assert_eq!(after.status, EvaluationStatus::Processing);
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(
            store.status_history(record.id).await,
            vec![EvaluationStatus::Queued, EvaluationStatus::Processing]
        );
    }

    #[tokio::test]
    async fn test_complete_requires_processing() {
        let store = MemoryStore::new();
        let record = store.create_evaluation(1, 1).await.unwrap();
        let outcome = EvaluationOutcome {
            cv_match_rate: 0.5,
            cv_feedback: String::new(),
            project_score: 5.0,
            project_feedback: String::new(),
            overall_summary: String::new(),
        };

        let err = store
            .complete(record.id, &outcome, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_missing_records_are_not_found() {
        let store = MemoryStore::new();
        assert!(store.get_upload(999).await.unwrap_err().is_not_found());
        assert!(store.get_job_spec(999).await.unwrap_err().is_not_found());
        assert!(store
            .update_status(999, EvaluationStatus::Processing)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
