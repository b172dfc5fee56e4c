/// Error types shared across MCP server crates.
///
/// These cover the infrastructure the servers have in common. Server-specific errors
/// live in each server crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("openai client error: {0}")]
    OpenAi(#[from] crate::openai::OpenAiClientError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis is not configured")]
    RedisUnavailable,
}
