use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::GatewayResult;
use crate::models::message::Message;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// One incremental piece of a streamed model reply
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    /// Output text
    Text(String),
    /// Reasoning text from thinking models, not part of the answer
    Reasoning(String),
    /// A raw tool call fragment
    ToolCall(Value),
}

pub type DeltaStream = BoxStream<'static, GatewayResult<ModelDelta>>;

/// The shared connection agents use to reach a chat-completions provider
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier sent with every request
    fn model(&self) -> &str;

    /// Provider base url, for diagnostics
    fn base_url(&self) -> &str;

    /// Generate the next message in one request
    async fn complete(&self, messages: &[Message]) -> GatewayResult<(Message, Usage)>;

    /// Generate the next message as a stream of deltas
    ///
    /// Status errors are returned before the stream is handed out.
    async fn stream(&self, messages: &[Message]) -> GatewayResult<DeltaStream>;
}
