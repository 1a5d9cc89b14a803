//! ScoreResult: typed projection of the model's loosely-typed JSON answer.
//!
//! The remote answer is first parsed into a `serde_json::Value` by the client; this
//! module checks the shape and pulls out the fields the record stores. Values are
//! passed through as given: a match rate of 1.4 or a score of 0 is not clamped.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::evaluation::EvaluationOutcome;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("result is not a JSON object")]
    NotAnObject,

    #[error("result is missing the `{0}` section")]
    MissingSection(&'static str),

    #[error("`{section}.{field}` is missing or not a number")]
    InvalidNumber {
        section: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvScore {
    pub match_rate: f64,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectScore {
    pub score: f64,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub cv: CvScore,
    pub project: ProjectScore,
    pub overall_summary: String,
}

impl ScoreResult {
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let root = value.as_object().ok_or(ValidationError::NotAnObject)?;
        let cv = section(root, "cv")?;
        let project = section(root, "project")?;

        Ok(ScoreResult {
            cv: CvScore {
                match_rate: number(cv, "cv", "match_rate")?,
                feedback: text(cv.get("feedback")),
            },
            project: ProjectScore {
                score: number(project, "project", "score")?,
                feedback: text(project.get("feedback")),
            },
            overall_summary: text(root.get("overall_summary")),
        })
    }

    pub fn into_outcome(self) -> EvaluationOutcome {
        EvaluationOutcome {
            cv_match_rate: self.cv.match_rate,
            cv_feedback: self.cv.feedback,
            project_score: self.project.score,
            project_feedback: self.project.feedback,
            overall_summary: self.overall_summary,
        }
    }
}

fn section<'a>(
    root: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a Map<String, Value>, ValidationError> {
    root.get(name)
        .and_then(Value::as_object)
        .ok_or(ValidationError::MissingSection(name))
}

fn number(
    section: &Map<String, Value>,
    section_name: &'static str,
    field: &'static str,
) -> Result<f64, ValidationError> {
    section
        .get(field)
        .and_then(Value::as_f64)
        .ok_or(ValidationError::InvalidNumber {
            section: section_name,
            field,
        })
}

/// Feedback fields are free text; anything that is not a string becomes empty.
fn text(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}
