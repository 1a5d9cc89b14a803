pub mod evaluation;
pub mod job;
pub mod upload;

pub use evaluation::{EvaluationRecord, EvaluationStatus};
pub use job::{JobSpec, Rubric, RubricCriterion};
pub use upload::{NewUpload, UploadRecord};
