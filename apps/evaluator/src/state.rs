use std::sync::Arc;

use crate::extraction::DocumentExtractor;
use crate::queue::JobQueue;
use crate::store::EvaluationStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every collaborator is built once in `main` and shared by `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EvaluationStore>,
    pub queue: Arc<dyn JobQueue>,
    pub extractor: Arc<DocumentExtractor>,
}
