use async_stream::try_stream;
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::configs::OllamaProviderConfig;
use super::utils::{normalize_base_url, provider_error_message, LineBuffer};
use crate::errors::{GatewayError, GatewayResult};

pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "qwen2.5";

/// One line of a generate response body
#[derive(Debug, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Client for a native ollama-style `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: OllamaProviderConfig) -> GatewayResult<Self> {
        let base_url = normalize_base_url(&config.host);
        Url::parse(&base_url).map_err(|e| {
            GatewayError::Configuration(format!("Invalid ollama host '{}': {}", config.host, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            model: config.model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn payload(&self, prompt: &str, system: Option<&str>, stream: bool) -> Value {
        let mut payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": stream,
        });
        if let Some(system) = system {
            payload["system"] = json!(system);
        }
        payload
    }

    async fn post(&self, payload: Value) -> GatewayResult<Response> {
        let response = self
            .client
            .post(self.generate_url())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| provider_error_message(&value))
            .unwrap_or(body);
        Err(GatewayError::Transport(format!(
            "Ollama returned {}: {}",
            status, detail
        )))
    }

    /// Generate the whole answer in one request
    pub async fn complete(&self, prompt: &str, system: Option<&str>) -> GatewayResult<String> {
        let response = self.post(self.payload(prompt, system, false)).await?;
        let data: Value = response.json().await?;

        Ok(data
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string())
    }

    /// Generate the answer as a stream of fragments
    ///
    /// The stream ends at the first `done: true` line, leaving the rest of the
    /// body unread.
    pub async fn stream(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> GatewayResult<BoxStream<'static, GatewayResult<String>>> {
        let response = self.post(self.payload(prompt, system, true)).await?;
        Ok(fragments(response.bytes_stream()).boxed())
    }
}

fn fragments<S, B>(body: S) -> impl Stream<Item = GatewayResult<String>>
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
                if let Some(parsed) = parse_line(&line) {
                    if let Some(fragment) = parsed.response {
                        yield fragment;
                    }
                    if parsed.done {
                        return;
                    }
                }
            }
        }

        if let Some(line) = lines.finish() {
            if let Some(fragment) = parse_line(&line).and_then(|parsed| parsed.response) {
                yield fragment;
            }
        }
    }
}

/// Lines that are blank or not a JSON object are skipped
fn parse_line(line: &str) -> Option<GenerateLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!("Skipping malformed generate line: {} ({})", line, e);
            None
        }
    }
}
