use serde_json::{json, Value};

use super::base::Usage;
use crate::errors::{GatewayError, GatewayResult};
use crate::models::message::Message;

/// Strip trailing slashes and any trailing `/v1` segments from a provider base url
///
/// Only the path is touched, never the scheme or host. Applying this twice
/// gives the same result as applying it once.
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    let host_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url[host_start..]
        .find('/')
        .map(|i| host_start + i)
        .unwrap_or(url.len());
    let (origin, mut path) = url.split_at(path_start);

    loop {
        path = path.trim_end_matches('/');
        match path.strip_suffix("/v1") {
            Some(stripped) => path = stripped,
            None => break,
        }
    }
    format!("{}{}", origin, path)
}

/// Longest line a provider may send before the stream is abandoned
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a chunked body into complete lines as bytes arrive
///
/// Bytes are held until a newline is seen, so multi-byte characters and lines
/// split across chunk boundaries decode correctly.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    // bytes of `pending` already known to hold no newline
    scanned: usize,
    limit: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
            limit,
        }
    }

    /// Add a chunk and drain every line it completed
    ///
    /// Fails once an unfinished line grows past the limit.
    pub fn push(&mut self, chunk: &[u8]) -> GatewayResult<Vec<String>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut scan = self.scanned;
        while let Some(offset) = self.pending[scan..].iter().position(|b| *b == b'\n') {
            let end = scan + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
            scan = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();

        if self.pending.len() > self.limit {
            self.pending.clear();
            self.scanned = 0;
            return Err(GatewayError::Transport(format!(
                "Response line exceeded {} bytes",
                self.limit
            )));
        }
        Ok(lines)
    }

    /// The trailing line left when the body ended without a newline
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    line.trim_end_matches('\r').to_string()
}

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            json!({
                "role": message.role.as_str(),
                "content": message.content,
            })
        })
        .collect()
}

/// Convert OpenAI's API response to internal Message format
///
/// Content may arrive as a plain string or as a list of typed parts; both are
/// flattened into the message text.
pub fn openai_response_to_message(response: &Value) -> GatewayResult<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| GatewayError::Agent("No message in model response".to_string()))?;

    let mut message = Message::assistant();
    match original.get("content") {
        Some(Value::String(text)) => message = message.with_text(text),
        Some(Value::Array(parts)) => {
            for part in parts {
                if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                    message = message.with_text(text);
                }
            }
        }
        _ => {}
    }

    Ok(message)
}

pub fn get_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usage") else {
        return Usage::default();
    };

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok());

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok());

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok())
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => input.checked_add(output),
            _ => None,
        });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Pull a readable message out of a provider error body
///
/// OpenAI-compatible servers nest it under `error.message`, ollama uses a bare
/// `error` string.
pub fn provider_error_message(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::String(message) => Some(message.clone()),
        error => error
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from),
    }
}
