use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::base::{DeltaStream, ModelClient, ModelDelta, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    get_usage, messages_to_openai_spec, openai_response_to_message, provider_error_message,
    LineBuffer,
};
use crate::errors::{GatewayError, GatewayResult};
use crate::models::message::Message;

/// Shared connection to an OpenAI-compatible chat-completions provider
pub struct OpenAiClient {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiProviderConfig) -> GatewayResult<Self> {
        Url::parse(&config.host).map_err(|e| {
            GatewayError::Configuration(format!("Invalid provider host '{}': {}", config.host, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.host.trim_end_matches('/')
        )
    }

    fn payload(&self, messages: &[Message], stream: bool) -> Value {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_openai_spec(messages),
            "stream": stream,
        });

        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }
        payload
    }

    async fn post(&self, payload: Value) -> GatewayResult<Response> {
        let mut request = self.client.post(self.completions_url()).json(&payload);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }
        let response = request.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| provider_error_message(&value))
            .unwrap_or(body);
        if status.as_u16() == 429 || status.is_server_error() {
            Err(GatewayError::Transport(format!(
                "Server error: {}: {}",
                status, detail
            )))
        } else {
            Err(GatewayError::Transport(format!(
                "Request failed: {}: {}",
                status, detail
            )))
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    fn base_url(&self) -> &str {
        &self.config.host
    }

    async fn complete(&self, messages: &[Message]) -> GatewayResult<(Message, Usage)> {
        let response = self.post(self.payload(messages, false)).await?;
        let data: Value = response.json().await?;

        let message = openai_response_to_message(&data)?;
        let usage = get_usage(&data);
        Ok((message, usage))
    }

    async fn stream(&self, messages: &[Message]) -> GatewayResult<DeltaStream> {
        let response = self.post(self.payload(messages, true)).await?;
        Ok(deltas(response.bytes_stream()).boxed())
    }
}

fn deltas<S, B>(body: S) -> impl Stream<Item = GatewayResult<ModelDelta>>
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]>,
{
    try_stream! {
        let mut body = Box::pin(body);
        let mut lines = LineBuffer::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(GatewayError::from)?;
            for line in lines.push(chunk.as_ref())? {
                match parse_sse_line(&line) {
                    SseLine::Skip => continue,
                    SseLine::Done => return,
                    SseLine::Chunk(value) => {
                        for delta in chunk_deltas(&value)? {
                            yield delta;
                        }
                    }
                }
            }
        }

        if let Some(line) = lines.finish() {
            if let SseLine::Chunk(value) = parse_sse_line(&line) {
                for delta in chunk_deltas(&value)? {
                    yield delta;
                }
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Skip,
    Done,
    Chunk(Value),
}

fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        // blank separators, comments and event/id fields
        return SseLine::Skip;
    };

    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str(data) {
        Ok(value) => SseLine::Chunk(value),
        Err(e) => {
            tracing::debug!("Skipping malformed stream chunk: {} ({})", data, e);
            SseLine::Skip
        }
    }
}

/// Split one chat-completion chunk into deltas, reasoning first
fn chunk_deltas(chunk: &Value) -> GatewayResult<Vec<ModelDelta>> {
    if let Some(message) = provider_error_message(chunk) {
        return Err(GatewayError::Transport(message));
    }

    let mut deltas = Vec::new();
    let Some(delta) = chunk
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
    else {
        return Ok(deltas);
    };

    if let Some(reasoning) = delta.get("reasoning_content").and_then(|r| r.as_str()) {
        if !reasoning.is_empty() {
            deltas.push(ModelDelta::Reasoning(reasoning.to_string()));
        }
    }
    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            deltas.push(ModelDelta::Text(text.to_string()));
        }
    }
    if let Some(tool_calls) = delta.get("tool_calls").and_then(|t| t.as_array()) {
        deltas.extend(tool_calls.iter().cloned().map(ModelDelta::ToolCall));
    }

    Ok(deltas)
}
