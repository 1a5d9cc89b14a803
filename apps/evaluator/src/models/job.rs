use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

/// A single weighted rubric dimension, e.g. `technical_skills → 40%`.
/// Used to build the seeded job specs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub weight: u32,
    pub criteria: String,
}

/// Rubric keyed by dimension name. Ordered so prompts render deterministically.
pub type Rubric = BTreeMap<String, RubricCriterion>;

/// Description + rubric an evaluation is scored against. Read-only after seeding.
///
/// The stored rubric is free-form JSON and reaches the prompt as written; only
/// the seed data is built from `Rubric`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobSpec {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub rubric: Json<Value>,
    pub created_at: DateTime<Utc>,
}

impl JobSpec {
    /// Rubric rendered as pretty JSON for prompt embedding. A null rubric renders as `{}`.
    pub fn rubric_text(&self) -> String {
        if self.rubric.0.is_null() {
            return "{}".to_string();
        }
        serde_json::to_string_pretty(&self.rubric.0).unwrap_or_else(|_| "{}".to_string())
    }
}
