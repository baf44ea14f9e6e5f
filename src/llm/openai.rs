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

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client for the OpenAI chat/embeddings API (or any compatible server).
///
/// Streaming responses use SSE framing: `data: ` lines carrying delta
/// JSON, closed by the `data: [DONE]` sentinel.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    client: Client,
    timeout: Duration,
    max_retries: usize,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig, api_key: String) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
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

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.top_p {
                obj.insert("top_p".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(s) = &request.stop {
                obj.insert("stop".to_string(), json!(s));
            }
        }

        body
    }
}

/// Parse one line of an SSE chat-completions stream.
fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = line.strip_prefix("data: ") else {
        return StreamLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    let Ok(frame) = serde_json::from_str::<Value>(data) else {
        return StreamLine::Skip;
    };
    if let Some(err) = frame["error"]["message"].as_str() {
        return StreamLine::Fail(err.to_string());
    }
    match frame["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => StreamLine::Delta(content.to_string()),
        _ => StreamLine::Skip,
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/v1/models", self.base_url);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await;
        match res {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.chat_body(&request, model_id, false);

        let builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body);
        let res = send_with_retry(builder, &url, self.max_retries).await?;

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ProviderError::malformed(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::malformed("missing choices[0].message.content"))
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, ProviderError>>, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.chat_body(&request, model_id, true);

        let builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);
        let res = send_with_retry(builder, &url, self.max_retries).await?;

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
                        let _ = tx.send(Err(ProviderError::connection(&url, e))).await;
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
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body);
        let res = send_with_retry(builder, &url, self.max_retries).await?;

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ProviderError::malformed(e.to_string()))?;

        let data = payload["data"]
            .as_array()
            .ok_or_else(|| ProviderError::malformed("missing data array"))?;

        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            let vec: Vec<f32> = item["embedding"]
                .as_array()
                .ok_or_else(|| ProviderError::malformed("missing embedding values"))?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            embeddings.push(vec);
        }

        Ok(embeddings)
    }
}
