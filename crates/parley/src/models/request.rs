use crate::errors::{GatewayError, GatewayResult};

/// A single inbound chat call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub text: String,
    pub conversation_id: Option<String>,
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            conversation_id: None,
            system_prompt: None,
        }
    }

    pub fn with_conversation_id<S: Into<String>>(mut self, conversation_id: S) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, system_prompt: S) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Reject blank input before anything reaches a backend
    pub fn validate(&self) -> GatewayResult<()> {
        if self.text.trim().is_empty() {
            return Err(GatewayError::Validation(
                "message must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The system prompt to use, ignoring blank overrides
    pub fn system_prompt_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.system_prompt.as_deref() {
            Some(prompt) if !prompt.trim().is_empty() => prompt,
            _ => default,
        }
    }
}
