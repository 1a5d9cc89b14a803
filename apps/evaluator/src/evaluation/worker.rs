//! Evaluation Worker: the single consumer of the job queue.
//!
//! One message is processed at a time, in delivery order. Per message:
//!
//! 1. mark `processing`
//! 2. load the job spec, then the upload
//! 3. call the scorer
//! 4. validate the `cv` / `project` sections
//! 5. persist the scored fields and mark `completed`
//!
//! Any failure in 2–5 marks the record `failed`. Nothing is retried. Each write stands
//! alone, so a crash mid-way leaves the record in `processing`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::evaluation::client::{EvaluationError, EvaluationInput, Scorer};
use crate::evaluation::score::{ScoreResult, ValidationError};
use crate::models::EvaluationStatus;
use crate::queue::{JobDescriptor, JobQueue, QueueError};
use crate::store::{EvaluationStore, StoreError};

/// Pause after a broker error before polling again.
const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("load job spec: {0}")]
    LoadJobSpec(StoreError),
    #[error("load upload: {0}")]
    LoadUpload(StoreError),
    #[error("scoring: {0}")]
    Scoring(#[from] EvaluationError),
    #[error("invalid result: {0}")]
    Validation(#[from] ValidationError),
    #[error("persist result: {0}")]
    Persist(StoreError),
}

impl WorkerError {
    pub fn stage(&self) -> &'static str {
        match self {
            WorkerError::LoadJobSpec(_) => "load_job_spec",
            WorkerError::LoadUpload(_) => "load_upload",
            WorkerError::Scoring(_) => "scoring",
            WorkerError::Validation(_) => "validation",
            WorkerError::Persist(_) => "persist",
        }
    }
}

/// What happened to one dequeued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
    /// The record was missing or already past `queued` (e.g. a redelivery).
    Skipped,
}

pub struct EvaluationWorker {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn EvaluationStore>,
    scorer: Arc<dyn Scorer>,
}

impl EvaluationWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn EvaluationStore>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self {
            queue,
            store,
            scorer,
        }
    }

    /// Consumes until `shutdown` flips to `true` or its sender is dropped.
    /// A message already being processed is finished before the loop exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Evaluation worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                received = self.queue.receive() => received,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match received {
                Ok(Some(job)) => {
                    self.handle(job).await;
                }
                Ok(None) => {}
                Err(e @ QueueError::Decode { .. }) => {
                    warn!(error = %e, "Discarding malformed job message");
                }
                Err(QueueError::Closed) => {
                    warn!("Job queue closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to receive job, backing off");
                    tokio::time::sleep(RECEIVE_BACKOFF).await;
                }
            }
        }
        info!("Evaluation worker stopped");
    }

    /// Drives one evaluation record to a terminal state.
    pub async fn handle(&self, job: JobDescriptor) -> Outcome {
        let span = info_span!(
            "evaluation",
            evaluation_id = job.evaluation_id,
            upload_id = job.upload_id,
            job_id = job.job_id,
        );
        self.handle_inner(job).instrument(span).await
    }

    async fn handle_inner(&self, job: JobDescriptor) -> Outcome {
        info!("Worker processing job");

        if let Err(e) = self
            .store
            .update_status(job.evaluation_id, EvaluationStatus::Processing)
            .await
        {
            match e {
                StoreError::NotFound { .. } | StoreError::InvalidTransition { .. } => {
                    warn!(error = %e, "Skipping job");
                    return Outcome::Skipped;
                }
                _ => {
                    error!(error = %e, "Could not mark evaluation processing");
                    self.mark_failed(job.evaluation_id).await;
                    return Outcome::Failed;
                }
            }
        }
        debug!(status = %EvaluationStatus::Processing, "Evaluation status transition");

        match self.process(job).await {
            Ok(()) => {
                info!("Worker finished job");
                Outcome::Completed
            }
            Err(e) => {
                error!(stage = e.stage(), error = %e, "Evaluation failed");
                self.mark_failed(job.evaluation_id).await;
                Outcome::Failed
            }
        }
    }

    async fn process(&self, job: JobDescriptor) -> Result<(), WorkerError> {
        let spec = self
            .store
            .get_job_spec(job.job_id)
            .await
            .map_err(WorkerError::LoadJobSpec)?;

        let upload = self
            .store
            .get_upload(job.upload_id)
            .await
            .map_err(WorkerError::LoadUpload)?;

        debug!(
            cv_chars = upload.cv_text.len(),
            project_chars = upload.project_text.len(),
            "Loaded evaluation inputs"
        );

        let rubric = spec.rubric_text();
        let raw = self
            .scorer
            .evaluate(EvaluationInput {
                description: &spec.description,
                rubric: &rubric,
                cv_text: &upload.cv_text,
                project_text: &upload.project_text,
            })
            .await?;

        let result = ScoreResult::from_value(&raw)?;
        debug!(
            match_rate = result.cv.match_rate,
            project_score = result.project.score,
            "Scoring result validated"
        );

        self.store
            .complete(job.evaluation_id, &result.into_outcome(), &raw)
            .await
            .map_err(WorkerError::Persist)
    }

    async fn mark_failed(&self, evaluation_id: i64) {
        if let Err(e) = self
            .store
            .update_status(evaluation_id, EvaluationStatus::Failed)
            .await
        {
            error!(error = %e, "Could not mark evaluation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::client::tests::{variants, ScriptedGenerator};
    use crate::evaluation::client::EvaluationClient;
    use crate::queue::memory::MemoryQueue;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Scorer returning a fixed answer and recording what it was asked.
    struct FixedScorer {
        answer: Result<Value, ()>,
        seen: Mutex<Vec<(String, String, String, String)>>,
    }

    impl FixedScorer {
        fn ok(value: Value) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(value),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: Err(()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Scorer for FixedScorer {
        async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<Value, EvaluationError> {
            self.seen.lock().unwrap().push((
                input.description.to_string(),
                input.cv_text.to_string(),
                input.project_text.to_string(),
                input.rubric.to_string(),
            ));
            self.answer.clone().map_err(|_| EvaluationError::NoVariants)
        }
    }

    fn example_answer() -> Value {
        json!({
            "cv": {"match_rate": 0.82, "feedback": "Strong backend exp"},
            "project": {"score": 8.5, "feedback": "Good error handling"},
            "overall_summary": "Solid candidate"
        })
    }

    fn job(evaluation_id: i64, upload_id: i64, job_id: i64) -> JobDescriptor {
        JobDescriptor {
            evaluation_id,
            upload_id,
            job_id,
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new().with_next_evaluation_id(42));
        store
            .insert_job_spec(
                2,
                "Product Engineer (Backend)",
                json!({"technical_skills": {"weight": 40, "criteria": "Go, MySQL, RabbitMQ"}}),
            )
            .await;
        store
            .insert_upload(7, "Jane Doe - backend engineer", "Evaluation service in Go")
            .await;
        store
    }

    fn worker(store: Arc<MemoryStore>, scorer: Arc<dyn Scorer>) -> EvaluationWorker {
        EvaluationWorker::new(Arc::new(MemoryQueue::new()), store, scorer)
    }

    #[tokio::test]
    async fn test_example_scenario_completes_with_exact_fields() {
        let store = seeded_store().await;
        let record = store.create_evaluation(7, 2).await.unwrap();
        assert_eq!(record.id, 42);

        let scorer = FixedScorer::ok(example_answer());
        let outcome = worker(store.clone(), scorer.clone())
            .handle(job(42, 7, 2))
            .await;

        assert_eq!(outcome, Outcome::Completed);
        let record = store.get_evaluation(42).await.unwrap();
        assert_eq!(record.status, EvaluationStatus::Completed);
        let fields = record.outcome.unwrap();
        assert_eq!(fields.cv_match_rate, 0.82);
        assert_eq!(fields.cv_feedback, "Strong backend exp");
        assert_eq!(fields.project_score, 8.5);
        assert_eq!(fields.project_feedback, "Good error handling");
        assert_eq!(fields.overall_summary, "Solid candidate");
        assert_eq!(record.result_json, Some(example_answer()));

        let seen = scorer.seen.lock().unwrap();
        assert_eq!(seen[0].0, "Product Engineer (Backend)");
        assert_eq!(seen[0].1, "Jane Doe - backend engineer");
        assert_eq!(seen[0].2, "Evaluation service in Go");
    }

    #[tokio::test]
    async fn test_free_form_rubric_reaches_the_scorer() {
        let store = seeded_store().await;
        store
            .insert_job_spec(
                3,
                "Data Engineer",
                json!({"experience": {"weight": 0.25, "criteria": "Pipelines", "levels": ["junior", "senior"]}}),
            )
            .await;
        store.create_evaluation(7, 3).await.unwrap();
        let scorer = FixedScorer::ok(example_answer());

        let outcome = worker(store.clone(), scorer.clone())
            .handle(job(42, 7, 3))
            .await;

        assert_eq!(outcome, Outcome::Completed);
        let seen = scorer.seen.lock().unwrap();
        assert!(seen[0].3.contains("\"weight\": 0.25"));
        assert!(seen[0].3.contains("\"senior\""));
    }

    #[tokio::test]
    async fn test_status_path_is_queued_processing_completed() {
        let store = seeded_store().await;
        store.create_evaluation(7, 2).await.unwrap();
        worker(store.clone(), FixedScorer::ok(example_answer()))
            .handle(job(42, 7, 2))
            .await;

        assert_eq!(
            store.status_history(42).await,
            vec![
                EvaluationStatus::Queued,
                EvaluationStatus::Processing,
                EvaluationStatus::Completed
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_upload_fails_without_scoring() {
        let store = seeded_store().await;
        store.create_evaluation(999, 2).await.unwrap();
        let scorer = FixedScorer::ok(example_answer());

        let outcome = worker(store.clone(), scorer.clone())
            .handle(job(42, 999, 2))
            .await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(
            store.get_evaluation(42).await.unwrap().status,
            EvaluationStatus::Failed
        );
        assert_eq!(scorer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_job_spec_fails_without_scoring() {
        let store = seeded_store().await;
        store.create_evaluation(7, 5).await.unwrap();
        let scorer = FixedScorer::ok(example_answer());

        let outcome = worker(store.clone(), scorer.clone())
            .handle(job(42, 7, 5))
            .await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(scorer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_scorer_error_marks_failed() {
        let store = seeded_store().await;
        store.create_evaluation(7, 2).await.unwrap();

        let outcome = worker(store.clone(), FixedScorer::failing())
            .handle(job(42, 7, 2))
            .await;

        assert_eq!(outcome, Outcome::Failed);
        let record = store.get_evaluation(42).await.unwrap();
        assert_eq!(record.status, EvaluationStatus::Failed);
        assert!(record.outcome.is_none());
    }

    #[tokio::test]
    async fn test_result_missing_project_section_marks_failed() {
        let store = seeded_store().await;
        store.create_evaluation(7, 2).await.unwrap();
        let answer = json!({
            "cv": {"match_rate": 0.82, "feedback": "Strong backend exp"},
            "overall_summary": "Solid candidate"
        });

        let outcome = worker(store.clone(), FixedScorer::ok(answer))
            .handle(job(42, 7, 2))
            .await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(
            store.get_evaluation(42).await.unwrap().status,
            EvaluationStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_result_missing_cv_section_marks_failed() {
        let store = seeded_store().await;
        store.create_evaluation(7, 2).await.unwrap();
        let answer = json!({
            "project": {"score": 8.5, "feedback": "Good error handling"},
            "overall_summary": "Solid candidate"
        });

        let outcome = worker(store.clone(), FixedScorer::ok(answer))
            .handle(job(42, 7, 2))
            .await;

        assert_eq!(outcome, Outcome::Failed);
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_persisted_unclamped() {
        let store = seeded_store().await;
        store.create_evaluation(7, 2).await.unwrap();
        let answer = json!({
            "cv": {"match_rate": 1.35, "feedback": ""},
            "project": {"score": 0.0, "feedback": ""},
            "overall_summary": ""
        });

        worker(store.clone(), FixedScorer::ok(answer))
            .handle(job(42, 7, 2))
            .await;

        let fields = store.get_evaluation(42).await.unwrap().outcome.unwrap();
        assert_eq!(fields.cv_match_rate, 1.35);
        assert_eq!(fields.project_score, 0.0);
    }

    #[tokio::test]
    async fn test_redelivered_terminal_record_is_skipped() {
        let store = seeded_store().await;
        store.create_evaluation(7, 2).await.unwrap();
        let scorer = FixedScorer::ok(example_answer());
        let worker = worker(store.clone(), scorer.clone());

        assert_eq!(worker.handle(job(42, 7, 2)).await, Outcome::Completed);
        assert_eq!(worker.handle(job(42, 7, 2)).await, Outcome::Skipped);

        assert_eq!(scorer.call_count(), 1);
        assert_eq!(
            store.get_evaluation(42).await.unwrap().status,
            EvaluationStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_unknown_evaluation_is_skipped() {
        let store = seeded_store().await;
        let outcome = worker(store, FixedScorer::ok(example_answer()))
            .handle(job(404, 7, 2))
            .await;
        assert_eq!(outcome, Outcome::Skipped);
    }

    #[tokio::test]
    async fn test_fallback_client_end_to_end() {
        let store = seeded_store().await;
        store.create_evaluation(7, 2).await.unwrap();
        let generator = Arc::new(
            ScriptedGenerator::new()
                .fail("gemini-2.0-flash-001", 500)
                .answer(
                    "gemini-2.0-flash",
                    &format!("```json\n{}\n```", example_answer()),
                ),
        );
        let client = Arc::new(EvaluationClient::new(
            generator.clone(),
            variants(&["gemini-2.0-flash-001", "gemini-2.0-flash", "gemini-2.5-flash"]),
        ));

        let outcome = worker(store.clone(), client).handle(job(42, 7, 2)).await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(
            generator.calls(),
            vec!["gemini-2.0-flash-001", "gemini-2.0-flash"]
        );
    }

    #[tokio::test]
    async fn test_run_loop_processes_in_order_and_stops_on_shutdown() {
        let store = seeded_store().await;
        let first = store.create_evaluation(7, 2).await.unwrap();
        let second = store.create_evaluation(7, 2).await.unwrap();

        let queue = Arc::new(MemoryQueue::new());
        queue.publish(&job(first.id, 7, 2)).await.unwrap();
        queue.publish(&job(second.id, 7, 2)).await.unwrap();

        let scorer = FixedScorer::ok(example_answer());
        let worker = EvaluationWorker::new(queue.clone(), store.clone(), scorer.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        for _ in 0..100 {
            if store.get_evaluation(second.id).await.unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(
            store.get_evaluation(first.id).await.unwrap().status,
            EvaluationStatus::Completed
        );
        assert_eq!(
            store.get_evaluation(second.id).await.unwrap().status,
            EvaluationStatus::Completed
        );
        assert_eq!(scorer.call_count(), 2);
    }
}
