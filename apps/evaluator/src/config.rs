use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::GEMINI_API_URL;
use crate::queue::DEFAULT_QUEUE_NAME;

/// Scoring models, tried in order.
pub const DEFAULT_SCORING_MODELS: &[&str] = &[
    "gemini-2.0-flash-001",
    "gemini-2.0-flash",
    "gemini-2.5-flash",
    "gemini-2.5-flash-preview-09-2025",
    "gemini-flash-latest",
];

/// Remote PDF extraction models, tried in order.
pub const DEFAULT_EXTRACTION_MODELS: &[&str] = &[
    "gemini-2.0-flash-001",
    "gemini-2.0-flash",
    "gemini-2.5-flash",
    "gemini-flash-latest",
];

/// Default cap on a whole `/upload` request body (both files plus form fields).
pub const DEFAULT_MAX_UPLOAD_MB: usize = 32;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub queue_name: String,
    pub scoring_models: Vec<String>,
    pub extraction_models: Vec<String>,
    pub scoring_timeout: Duration,
    pub extraction_timeout: Duration,
    pub publish_timeout: Duration,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_base_url: optional_env("GEMINI_BASE_URL")
                .unwrap_or_else(|| GEMINI_API_URL.to_string()),
            queue_name: optional_env("QUEUE_NAME")
                .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string()),
            scoring_models: model_list(
                optional_env("SCORING_MODELS").as_deref(),
                DEFAULT_SCORING_MODELS,
            ),
            extraction_models: model_list(
                optional_env("EXTRACTION_MODELS").as_deref(),
                DEFAULT_EXTRACTION_MODELS,
            ),
            scoring_timeout: seconds_env("SCORING_TIMEOUT_SECS", 30)?,
            extraction_timeout: seconds_env("EXTRACTION_TIMEOUT_SECS", 120)?,
            publish_timeout: seconds_env("PUBLISH_TIMEOUT_SECS", 5)?,
            max_upload_bytes: match optional_env("MAX_UPLOAD_MB") {
                Some(raw) => parse_megabytes("MAX_UPLOAD_MB", &raw)?,
                None => DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            },
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn seconds_env(key: &str, default: u64) -> Result<Duration> {
    let secs = match optional_env(key) {
        Some(raw) => parse_seconds(key, &raw)?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

fn parse_seconds(key: &str, raw: &str) -> Result<u64> {
    let secs = raw
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of seconds"))?;
    anyhow::ensure!(secs > 0, "{key} must be greater than zero");
    Ok(secs)
}

fn parse_megabytes(key: &str, raw: &str) -> Result<usize> {
    let mb = raw
        .parse::<usize>()
        .with_context(|| format!("{key} must be a whole number of megabytes"))?;
    anyhow::ensure!(mb > 0, "{key} must be greater than zero");
    mb.checked_mul(1024 * 1024)
        .with_context(|| format!("{key} is too large"))
}

/// Parses a comma-separated model list, dropping blanks. Falls back to `defaults`
/// when the variable is unset or lists nothing.
fn model_list(raw: Option<&str>, defaults: &[&str]) -> Vec<String> {
    let parsed: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();

    if parsed.is_empty() {
        defaults.iter().map(|m| m.to_string()).collect()
    } else {
        parsed
    }
}
