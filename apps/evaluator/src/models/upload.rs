use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Extracted candidate documents for one submission. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UploadRecord {
    pub id: i64,
    pub candidate_name: String,
    pub candidate_email: String,
    pub cv_text: String,
    pub project_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUpload {
    pub candidate_name: String,
    pub candidate_email: String,
    pub cv_text: String,
    pub project_text: String,
}
