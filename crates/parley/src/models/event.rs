use serde::{Deserialize, Serialize};

/// One event of a streamed reply
///
/// A sequence is always `Start, Content*, (End | Error)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GatewayEvent {
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
    Content {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
    End {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
    Error {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
}

impl GatewayEvent {
    pub fn start(conversation_id: Option<String>) -> Self {
        GatewayEvent::Start { conversation_id }
    }

    pub fn content<S: Into<String>>(content: S, conversation_id: Option<String>) -> Self {
        GatewayEvent::Content {
            content: content.into(),
            conversation_id,
        }
    }

    pub fn end(conversation_id: Option<String>) -> Self {
        GatewayEvent::End { conversation_id }
    }

    pub fn error<S: Into<String>>(content: S, conversation_id: Option<String>) -> Self {
        GatewayEvent::Error {
            content: content.into(),
            conversation_id,
        }
    }

    /// End and Error close the sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, GatewayEvent::End { .. } | GatewayEvent::Error { .. })
    }

    pub fn as_content(&self) -> Option<&str> {
        match self {
            GatewayEvent::Content { content, .. } => Some(content),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let start = GatewayEvent::start(Some("c-1".to_string()));
        assert_eq!(
            serde_json::to_value(&start).unwrap(),
            json!({"type": "start", "conversation_id": "c-1"})
        );

        let content = GatewayEvent::content("Hello", None);
        assert_eq!(
            serde_json::to_value(&content).unwrap(),
            json!({"type": "content", "content": "Hello"})
        );

        let error = GatewayEvent::error("boom", Some("c-1".to_string()));
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"type": "error", "content": "boom", "conversation_id": "c-1"})
        );

        assert_eq!(
            serde_json::to_value(GatewayEvent::end(None)).unwrap(),
            json!({"type": "end"})
        );
    }

    #[test]
    fn test_terminal_events() {
        assert!(!GatewayEvent::start(None).is_terminal());
        assert!(!GatewayEvent::content("x", None).is_terminal());
        assert!(GatewayEvent::end(None).is_terminal());
        assert!(GatewayEvent::error("x", None).is_terminal());
    }
}
