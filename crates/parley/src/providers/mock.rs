use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};

use crate::errors::GatewayResult;
use crate::models::message::Message;
use crate::providers::base::{DeltaStream, ModelClient, ModelDelta, Usage};

/// A mock model client that replays pre-configured turns for testing
pub struct MockModelClient {
    turns: Arc<Mutex<Vec<Vec<GatewayResult<ModelDelta>>>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockModelClient {
    /// Each entry is one turn: the deltas it streams, in order
    pub fn new(turns: Vec<Vec<GatewayResult<ModelDelta>>>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A client whose turns each answer with the given text deltas
    pub fn with_text(turns: &[&[&str]]) -> Self {
        Self::new(
            turns
                .iter()
                .map(|deltas| {
                    deltas
                        .iter()
                        .map(|d| Ok(ModelDelta::Text(d.to_string())))
                        .collect()
                })
                .collect(),
        )
    }

    /// Message lists received so far, one per call
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    fn next_turn(&self, messages: &[Message]) -> Vec<GatewayResult<ModelDelta>> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            // Return an empty turn if no more pre-configured ones
            Vec::new()
        } else {
            turns.remove(0)
        }
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    fn model(&self) -> &str {
        "mock-model"
    }

    fn base_url(&self) -> &str {
        "http://mock.invalid/v1"
    }

    async fn complete(&self, messages: &[Message]) -> GatewayResult<(Message, Usage)> {
        let mut message = Message::assistant();
        for delta in self.next_turn(messages) {
            if let ModelDelta::Text(text) = delta? {
                message = message.with_text(text);
            }
        }
        Ok((message, Usage::default()))
    }

    async fn stream(&self, messages: &[Message]) -> GatewayResult<DeltaStream> {
        Ok(stream::iter(self.next_turn(messages)).boxed())
    }
}
