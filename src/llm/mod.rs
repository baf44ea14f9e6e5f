pub mod ollama;
pub mod openai;
pub mod provider;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

pub use provider::{LlmProvider, ProviderError};
pub use types::{ChatMessage, ChatRequest};

use crate::config::{ProviderConfig, ProviderKind};
use crate::errors::WorkerError;

/// Build the provider client named by the configuration.
///
/// OpenAI requires a key (config value or the `api_key_env` variable);
/// construction fails without one so the problem surfaces before the
/// first turn.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>, WorkerError> {
    match config.kind {
        ProviderKind::Ollama => Ok(Arc::new(ollama::OllamaProvider::new(config))),
        ProviderKind::OpenAi => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                WorkerError::generation(ProviderError::MissingApiKey {
                    env: config.api_key_env.clone(),
                })
            })?;
            Ok(Arc::new(openai::OpenAiProvider::new(config, api_key)))
        }
    }
}

/// One parsed line of a streaming response body.
#[derive(Debug, PartialEq)]
pub(crate) enum StreamLine {
    /// A content delta to forward.
    Delta(String),
    /// End of the stream.
    Done,
    /// Heartbeats, framing noise, deltas without content.
    Skip,
    /// An in-band error reported by the server.
    Fail(String),
}

/// Reassembles newline-delimited frames from a byte stream.
///
/// Network chunks can split a frame anywhere, including mid-codepoint,
/// so bytes are buffered raw and only complete lines are decoded.
#[derive(Default)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete line, without its terminator.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }
}

/// Send a request, retrying transient failures.
///
/// 429 and 5xx responses and connection errors are retried up to
/// `max_retries` times with exponential backoff (1s doubling, capped at
/// 32s); any other non-success status fails immediately.
pub(crate) async fn send_with_retry(
    builder: reqwest::RequestBuilder,
    url: &str,
    max_retries: usize,
) -> Result<reqwest::Response, ProviderError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let request = builder
            .try_clone()
            .ok_or_else(|| ProviderError::Request("request body is not clonable".to_string()))?;

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                let err = ProviderError::api(status.as_u16(), body);
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!(
                        url,
                        status = status.as_u16(),
                        attempt,
                        "transient provider error, retrying"
                    );
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(ProviderError::connection(url, e));
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| ProviderError::Request("request failed after retries".to_string())))
}
