use async_stream::try_stream;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;

use crate::errors::GatewayResult;
use crate::models::message::Message;
use crate::providers::base::{ModelClient, ModelDelta, Usage};

pub const DEFAULT_AGENT_NAME: &str = "chat_assistant";

/// Events an agent emits over the lifetime of one turn
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A piece of the reply text
    TextDelta(String),
    /// A piece of the model's reasoning, not part of the reply
    ReasoningDelta(String),
    /// A tool call fragment requested by the model
    ToolCallDelta(Value),
    /// The turn finished
    Completed(TaskResult),
}

/// The outcome of one agent turn
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    /// The messages of this turn, the task first and the reply last
    pub messages: Vec<Message>,
    pub usage: Option<Usage>,
}

impl TaskResult {
    /// Text of the last message, if it has any
    pub fn last_text(&self) -> Option<&str> {
        self.messages.last().and_then(|message| message.text())
    }
}

/// Agent pairs a system prompt with the shared model connection
///
/// Agents are immutable once built. Every turn sends the system prompt and the
/// task alone, so callers sharing an agent never see each other's messages.
pub struct Agent {
    name: String,
    system_prompt: String,
    streaming: bool,
    client: Arc<dyn ModelClient>,
}

impl Agent {
    pub fn new<S: Into<String>, P: Into<String>>(
        name: S,
        system_prompt: P,
        client: Arc<dyn ModelClient>,
        streaming: bool,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            streaming,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }

    /// Build the request for a turn: the system prompt, then the task
    fn prepare(&self, task: &Message) -> Vec<Message> {
        vec![Message::system().with_text(&self.system_prompt), task.clone()]
    }

    /// Run one turn to completion
    pub async fn run(&self, task: &str) -> GatewayResult<TaskResult> {
        let task = Message::user().with_text(task);
        let messages = self.prepare(&task);

        let (reply, usage) = self.client.complete(&messages).await?;
        tracing::debug!(
            "Agent {} finished turn, usage: {:?}",
            self.name,
            usage.total_tokens
        );
        Ok(TaskResult {
            messages: vec![task, reply],
            usage: Some(usage),
        })
    }

    /// Run one turn, emitting events as the model produces them
    ///
    /// Without streaming enabled the turn runs as a single request and only
    /// `Completed` is emitted.
    pub fn run_stream(self: Arc<Self>, task: String) -> BoxStream<'static, GatewayResult<AgentEvent>> {
        self.turn_events(task).boxed()
    }

    fn turn_events(self: Arc<Self>, task: String) -> impl Stream<Item = GatewayResult<AgentEvent>> {
        try_stream! {
            if !self.streaming {
                let result = self.run(&task).await?;
                yield AgentEvent::Completed(result);
                return;
            }

            let task = Message::user().with_text(task);
            let messages = self.prepare(&task);

            let mut deltas = self.client.stream(&messages).await?;
            let mut reply = Message::assistant();
            while let Some(delta) = deltas.next().await {
                match delta? {
                    ModelDelta::Text(text) => {
                        reply = reply.with_text(&text);
                        yield AgentEvent::TextDelta(text);
                    }
                    ModelDelta::Reasoning(text) => {
                        yield AgentEvent::ReasoningDelta(text);
                    }
                    ModelDelta::ToolCall(call) => {
                        yield AgentEvent::ToolCallDelta(call);
                    }
                }
            }

            yield AgentEvent::Completed(TaskResult {
                messages: vec![task, reply],
                usage: None,
            });
        }
    }
}
