//! Evaluation Service Client: scores a candidate against a job spec by walking an
//! ordered list of model variants until one answers with a JSON object.
//!
//! Variants are tried one after another, never raced. The first success returns
//! immediately and later variants are not contacted.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::evaluation::prompts::build_evaluation_prompt;
use crate::llm_client::{
    extract_json_object, GenerateRequest, GenerationConfig, LlmError, ModelVariant, Part,
    TextGenerator,
};

const TEMPERATURE: f32 = 0.1;
const TOP_P: f32 = 0.8;
const TOP_K: u32 = 40;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("model answer is not valid JSON: {0}")]
    MalformedJson(serde_json::Error),

    #[error("model answer is JSON but not an object")]
    NotAnObject,

    #[error("all {attempts} model variants failed; last error: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<EvaluationError>,
    },

    #[error("no model variants configured")]
    NoVariants,
}

/// Inputs for one evaluation, borrowed from the loaded job spec and upload.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub description: &'a str,
    pub rubric: &'a str,
    pub cv_text: &'a str,
    pub project_text: &'a str,
}

/// Produces the raw scoring payload for an evaluation.
///
/// The returned value is guaranteed to be a JSON object; the caller checks its
/// nested sections. Carried by the worker as `Arc<dyn Scorer>`.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<Value, EvaluationError>;
}

pub struct EvaluationClient {
    generator: Arc<dyn TextGenerator>,
    variants: Vec<ModelVariant>,
}

impl EvaluationClient {
    pub fn new(generator: Arc<dyn TextGenerator>, variants: Vec<ModelVariant>) -> Self {
        Self {
            generator,
            variants,
        }
    }

    fn request(prompt: String) -> GenerateRequest {
        GenerateRequest::new(
            vec![Part::text(prompt)],
            GenerationConfig {
                temperature: TEMPERATURE,
                top_p: Some(TOP_P),
                top_k: Some(TOP_K),
                max_output_tokens: None,
            },
        )
    }

    /// One call to one variant, parsed down to a JSON object.
    async fn attempt(
        &self,
        variant: &ModelVariant,
        request: &GenerateRequest,
    ) -> Result<Value, EvaluationError> {
        let text = self
            .generator
            .generate(&variant.model, request, variant.timeout)
            .await?;

        let value: Value =
            serde_json::from_str(extract_json_object(&text)).map_err(EvaluationError::MalformedJson)?;

        if !value.is_object() {
            return Err(EvaluationError::NotAnObject);
        }
        Ok(value)
    }
}

#[async_trait]
impl Scorer for EvaluationClient {
    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<Value, EvaluationError> {
        let prompt = build_evaluation_prompt(
            input.description,
            input.rubric,
            input.cv_text,
            input.project_text,
        );
        let request = Self::request(prompt);

        let mut last_error: Option<EvaluationError> = None;

        for variant in &self.variants {
            match self.attempt(variant, &request).await {
                Ok(value) => {
                    info!(model = %variant.model, "Evaluation model succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(model = %variant.model, error = %e, "Evaluation model failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(last) => Err(EvaluationError::Exhausted {
                attempts: self.variants.len(),
                last: Box::new(last),
            }),
            None => Err(EvaluationError::NoVariants),
        }
    }
}
