use std::time::Duration;

use mcp_common::error::CommonError;
use mcp_common::openai::OpenAiClientError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to read history for target {target_id}: {source}")]
    HistoryRead {
        target_id: String,
        source: CommonError,
    },

    #[error("failed to persist history for target {target_id}")]
    HistoryWrite { target_id: String },
}

/// The voice corpus is structurally invalid. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read corpus {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("corpus is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corpus datasetVersion must not be empty")]
    MissingVersion,

    #[error("rule #{index} has no id")]
    MissingId { index: usize },

    #[error("rule {id}: unknown category '{category}'")]
    UnknownCategory { id: String, category: String },

    #[error("rule {id}: unknown audience '{audience}'")]
    UnknownAudience { id: String, audience: String },

    #[error("rule {id}: text must not be empty")]
    EmptyText { id: String },

    #[error("duplicate rule id: {0}")]
    DuplicateId(String),
}

/// A generation response could not be turned into three variants.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("response has no variants array")]
    MissingVariants,

    #[error("expected {expected} variants, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("variant #{index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
}

/// Anything that sends the orchestrator down the fallback path.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] OpenAiClientError),

    #[error("generation returned no content")]
    EmptyCompletion,

    #[error("unusable generation response: {0}")]
    Parse(#[from] ParseError),
}
