use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::{LlmProvider, ProviderError};
use super::types::ChatRequest;
use super::{send_with_retry, LineBuffer, StreamLine};
use crate::config::ProviderConfig;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for a local Ollama instance.
///
/// Chat uses `POST /api/chat`; streaming responses arrive as NDJSON
/// frames terminated by one with `"done": true`. Embeddings use
/// `POST /api/embed`.
#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    client: Client,
    timeout: Duration,
    max_retries: usize,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        }
    }

    fn chat_body(&self, request: &ChatRequest, model_id: &str, stream: bool) -> Value {
        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": stream,
        });

        let mut options = serde_json::Map::new();
        if let Some(t) = request.temperature {
            options.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.top_p {
            options.insert("top_p".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            options.insert("num_predict".to_string(), json!(t));
        }
        if let Some(s) = &request.stop {
            options.insert("stop".to_string(), json!(s));
        }
        if !options.is_empty() {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("options".to_string(), Value::Object(options));
            }
        }

        body
    }
}

/// Point connection failures at the usual culprit: no local Ollama.
fn connection_hint(err: ProviderError) -> ProviderError {
    match err {
        ProviderError::Connection { url, message } => ProviderError::Connection {
            url,
            message: format!("{message} (is Ollama running?)"),
        },
        other => other,
    }
}

/// Parse one NDJSON frame of an `/api/chat` stream.
fn parse_stream_line(line: &str) -> StreamLine {
    if line.is_empty() {
        return StreamLine::Skip;
    }
    let Ok(frame) = serde_json::from_str::<Value>(line) else {
        return StreamLine::Skip;
    };
    if let Some(err) = frame["error"].as_str() {
        return StreamLine::Fail(err.to_string());
    }
    if frame["done"].as_bool() == Some(true) {
        return StreamLine::Done;
    }
    match frame["message"]["content"].as_str() {
        Some(content) if !content.is_empty() => StreamLine::Delta(content.to_string()),
        _ => StreamLine::Skip,
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let res = self
            .client
            .get(&self.base_url)
            .timeout(self.timeout)
            .send()
            .await;
        match res {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.chat_body(&request, model_id, false);

        let builder = self.client.post(&url).timeout(self.timeout).json(&body);
        let res = send_with_retry(builder, &url, self.max_retries)
            .await
            .map_err(connection_hint)?;

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ProviderError::malformed(e.to_string()))?;

        payload["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::malformed("missing message.content"))
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, ProviderError>>, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.chat_body(&request, model_id, true);

        // No per-request timeout here: a generation may legitimately run
        // longer than the non-streaming deadline.
        let builder = self.client.post(&url).json(&body);
        let res = send_with_retry(builder, &url, self.max_retries)
            .await
            .map_err(connection_hint)?;

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            let mut buf = LineBuffer::default();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        buf.push(&bytes);
                        while let Some(line) = buf.next_line() {
                            match parse_stream_line(&line) {
                                StreamLine::Delta(content) => {
                                    if tx.send(Ok(content)).await.is_err() {
                                        return;
                                    }
                                }
                                StreamLine::Done => return,
                                StreamLine::Skip => {}
                                StreamLine::Fail(message) => {
                                    let _ = tx.send(Err(ProviderError::Request(message))).await;
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let err = connection_hint(ProviderError::connection(&url, e));
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn embed(
        &self,
        inputs: &[String],
        model_id: &str,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let builder = self.client.post(&url).timeout(self.timeout).json(&body);
        let res = send_with_retry(builder, &url, self.max_retries)
            .await
            .map_err(connection_hint)?;

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ProviderError::malformed(e.to_string()))?;

        let embeddings = payload["embeddings"]
            .as_array()
            .ok_or_else(|| ProviderError::malformed("missing embeddings array"))?;

        let mut result = Vec::with_capacity(embeddings.len());
        for embedding in embeddings {
            let vec: Vec<f32> = embedding
                .as_array()
                .ok_or_else(|| ProviderError::malformed("embedding is not an array"))?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            result.push(vec);
        }

        Ok(result)
    }
}
