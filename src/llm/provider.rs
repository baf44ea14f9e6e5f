use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::ChatRequest;

/// Failures raised by a provider client. Call sites fold these into the
/// turn-level category that fits the phase they happened in.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("cannot reach {url}: {message}")]
    Connection { url: String, message: String },

    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("OpenAI API key is missing (set {env} or provider.api_key)")]
    MissingApiKey { env: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl ProviderError {
    pub fn connection<E: std::fmt::Display>(url: &str, err: E) -> Self {
        ProviderError::Connection {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        ProviderError::Api {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ProviderError::Malformed(message.into())
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name (e.g. "ollama", "openai")
    fn name(&self) -> &str;

    /// check whether the provider endpoint is reachable
    async fn health_check(&self) -> Result<bool, ProviderError>;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ProviderError>;

    /// chat completion (streaming); the receiver yields content deltas in
    /// production order and closes after the final one
    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, ProviderError>>, ProviderError>;

    /// embed each input text, one vector per input, order preserved
    async fn embed(&self, inputs: &[String], model_id: &str)
        -> Result<Vec<Vec<f32>>, ProviderError>;
}
