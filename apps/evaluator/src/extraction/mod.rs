//! Document Text Extractor: turns an uploaded file into text for scoring.
//!
//! PDFs go through three layers, each used only when the previous one produced
//! nothing: native page parsing, remote model extraction, raw byte prefix.
//! Extraction degrades rather than fails: every input, empty ones included, yields
//! some text.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::{GenerateRequest, GenerationConfig, LlmError, ModelVariant, Part, TextGenerator};

pub mod handlers;
pub mod pdf;
pub mod prompts;

/// Byte budget for files of unknown type.
pub const OTHER_BYTE_LIMIT: usize = 10_000;
/// Byte budget when every PDF strategy failed.
pub const PDF_RAW_BYTE_LIMIT: usize = 5_000;
const NATIVE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("native PDF extraction: {0}")]
    Native(#[from] pdf::NativePdfError),

    #[error("native PDF extraction timed out after {0:?}")]
    NativeTimeout(Duration),

    #[error("native PDF extraction task failed: {0}")]
    NativeTask(String),

    #[error("remote extraction: {0}")]
    Remote(#[from] LlmError),

    #[error("model {0} returned no text")]
    RemoteEmpty(String),

    #[error("all {attempts} extraction models failed; last error: {last}")]
    RemoteExhausted {
        attempts: usize,
        last: Box<ExtractionError>,
    },

    #[error("no extraction models configured")]
    NoVariants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
    Other,
}

impl DocumentKind {
    /// Classifies by file extension or MIME type, case-insensitively.
    pub fn from_hint(hint: &str) -> Self {
        let hint = hint.trim().to_ascii_lowercase();
        let extension = hint.rsplit('.').next().unwrap_or(&hint);

        if extension == "pdf" || hint == "application/pdf" {
            DocumentKind::Pdf
        } else if extension == "txt" || hint.starts_with("text/plain") {
            DocumentKind::Text
        } else {
            DocumentKind::Other
        }
    }
}

pub struct DocumentExtractor {
    generator: Arc<dyn TextGenerator>,
    variants: Vec<ModelVariant>,
    native_timeout: Duration,
}

impl DocumentExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>, variants: Vec<ModelVariant>) -> Self {
        Self {
            generator,
            variants,
            native_timeout: NATIVE_TIMEOUT,
        }
    }

    pub async fn extract(&self, data: &[u8], hint: &str) -> String {
        match DocumentKind::from_hint(hint) {
            DocumentKind::Text => String::from_utf8_lossy(data).into_owned(),
            DocumentKind::Pdf => self.extract_pdf(data).await,
            DocumentKind::Other => decode_prefix(data, OTHER_BYTE_LIMIT),
        }
    }

    async fn extract_pdf(&self, data: &[u8]) -> String {
        if data.is_empty() {
            warn!("Empty PDF upload, nothing to extract");
            return String::new();
        }

        match self.extract_native(data).await {
            Ok(text) => return text,
            Err(e) => warn!(error = %e, "Standard PDF extraction failed, trying remote model"),
        }

        match self.extract_remote(data).await {
            Ok(text) => return text,
            Err(e) => warn!(error = %e, "Remote PDF extraction failed"),
        }

        warn!(
            bytes = data.len(),
            limit = PDF_RAW_BYTE_LIMIT,
            "All extraction methods failed, returning raw data"
        );
        decode_prefix(data, PDF_RAW_BYTE_LIMIT)
    }

    async fn extract_native(&self, data: &[u8]) -> Result<String, ExtractionError> {
        let owned = data.to_vec();
        let task = tokio::task::spawn_blocking(move || pdf::extract_text(&owned));

        let text = tokio::time::timeout(self.native_timeout, task)
            .await
            .map_err(|_| ExtractionError::NativeTimeout(self.native_timeout))?
            .map_err(|e| ExtractionError::NativeTask(e.to_string()))??;
        Ok(text)
    }

    async fn extract_remote(&self, data: &[u8]) -> Result<String, ExtractionError> {
        let request = GenerateRequest::new(
            vec![
                Part::text(prompts::pdf_extraction_prompt()),
                Part::inline("application/pdf", STANDARD.encode(data)),
            ],
            GenerationConfig {
                temperature: 0.1,
                max_output_tokens: Some(MAX_OUTPUT_TOKENS),
                ..GenerationConfig::default()
            },
        );

        let mut last_error: Option<ExtractionError> = None;

        for variant in &self.variants {
            info!(model = %variant.model, "Trying model for PDF extraction");
            match self
                .generator
                .generate(&variant.model, &request, variant.timeout)
                .await
            {
                Ok(text) if !text.trim().is_empty() => {
                    let text = text.trim().to_string();
                    info!(model = %variant.model, chars = text.len(), "Extracted PDF text with model");
                    return Ok(text);
                }
                Ok(_) => {
                    warn!(model = %variant.model, "Model returned no text");
                    last_error = Some(ExtractionError::RemoteEmpty(variant.model.clone()));
                }
                Err(e) => {
                    warn!(model = %variant.model, error = %e, "Model failed for PDF extraction");
                    last_error = Some(e.into());
                }
            }
        }

        match last_error {
            Some(last) => Err(ExtractionError::RemoteExhausted {
                attempts: self.variants.len(),
                last: Box::new(last),
            }),
            None => Err(ExtractionError::NoVariants),
        }
    }
}

/// Lossy-decodes at most `limit` bytes. A multi-byte character cut at the
/// boundary becomes U+FFFD.
fn decode_prefix(data: &[u8], limit: usize) -> String {
    String::from_utf8_lossy(&data[..data.len().min(limit)]).into_owned()
}
