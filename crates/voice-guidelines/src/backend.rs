/// The external text-generation service, as seen by the orchestrator.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use mcp_common::error::CommonError;
use mcp_common::openai::{
    ChatCompletionRequest, Message, OpenAiClient, OpenAiClientConfig, ResponseFormat,
};

use crate::error::{AppError, GenerationError};

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send the rendered prompt and return the raw completion text. One attempt only.
    async fn complete(&self, messages: Vec<Message>) -> Result<String, GenerationError>;
}

/// Generation through an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiBackend {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: Option<f32>,
    request_timeout: Duration,
}

impl OpenAiBackend {
    /// Build the HTTP client from `config` and wrap it.
    pub fn connect(
        config: OpenAiClientConfig,
        model: String,
        temperature: Option<f32>,
        request_timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = OpenAiClient::new(config).map_err(CommonError::from)?;
        Ok(Self::new(Arc::new(client), model, temperature, request_timeout))
    }

    pub fn new(
        client: Arc<OpenAiClient>,
        model: String,
        temperature: Option<f32>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client,
            model,
            temperature,
            request_timeout,
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn complete(&self, messages: Vec<Message>) -> Result<String, GenerationError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: None,
            response_format: Some(ResponseFormat::json_object()),
        };

        let response = self
            .client
            .chat_completions(&request, Some(self.request_timeout))
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.request_timeout)
                } else {
                    GenerationError::Transport(e)
                }
            })?;

        if let Some(usage) = &response.usage {
            debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "generation usage"
            );
        }

        response
            .first_content()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(GenerationError::EmptyCompletion)
    }
}
