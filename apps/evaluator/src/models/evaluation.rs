use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Lifecycle of an evaluation. Transitions only move forward:
/// `queued → processing → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationStatus::Queued => "queued",
            EvaluationStatus::Processing => "processing",
            EvaluationStatus::Completed => "completed",
            EvaluationStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EvaluationStatus::Completed | EvaluationStatus::Failed)
    }

    /// `failed` is reachable from `queued` as well, for records whose job
    /// descriptor never made it onto the queue.
    pub fn can_transition_to(&self, next: EvaluationStatus) -> bool {
        use EvaluationStatus::*;
        matches!(
            (self, next),
            (Queued, Processing) | (Queued, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }

    /// Statuses a record may be in for a move to `next` to be legal.
    pub fn predecessors(next: EvaluationStatus) -> &'static [EvaluationStatus] {
        use EvaluationStatus::*;
        match next {
            Queued => &[],
            Processing => &[Queued],
            Completed => &[Processing],
            Failed => &[Queued, Processing],
        }
    }
}

impl FromStr for EvaluationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(EvaluationStatus::Queued),
            "processing" => Ok(EvaluationStatus::Processing),
            "completed" => Ok(EvaluationStatus::Completed),
            "failed" => Ok(EvaluationStatus::Failed),
            _ => Err(format!("Invalid evaluation status: {s}")),
        }
    }
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The scored fields written when an evaluation completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub cv_match_rate: f64,
    pub cv_feedback: String,
    pub project_score: f64,
    pub project_feedback: String,
    pub overall_summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    pub id: i64,
    pub upload_id: i64,
    pub job_id: i64,
    pub status: EvaluationStatus,
    pub outcome: Option<EvaluationOutcome>,
    /// Full model payload as returned, kept for auditing.
    pub result_json: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct EvaluationRow {
    pub id: i64,
    pub upload_id: i64,
    pub job_id: i64,
    pub status: String,
    pub cv_match_rate: Option<f64>,
    pub cv_feedback: Option<String>,
    pub project_score: Option<f64>,
    pub project_feedback: Option<String>,
    pub overall_summary: Option<String>,
    pub result_json: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EvaluationRow> for EvaluationRecord {
    type Error = String;

    fn try_from(row: EvaluationRow) -> Result<Self, Self::Error> {
        let status: EvaluationStatus = row.status.parse()?;
        let outcome = match (row.cv_match_rate, row.project_score) {
            (Some(cv_match_rate), Some(project_score)) if status == EvaluationStatus::Completed => {
                Some(EvaluationOutcome {
                    cv_match_rate,
                    cv_feedback: row.cv_feedback.unwrap_or_default(),
                    project_score,
                    project_feedback: row.project_feedback.unwrap_or_default(),
                    overall_summary: row.overall_summary.unwrap_or_default(),
                })
            }
            _ => None,
        };

        Ok(EvaluationRecord {
            id: row.id,
            upload_id: row.upload_id,
            job_id: row.job_id,
            status,
            outcome,
            result_json: row.result_json,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
