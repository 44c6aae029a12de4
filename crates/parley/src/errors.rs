use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum GatewayError {
    /// Network or HTTP failure while talking to a provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// The agent runtime produced no usable content
    #[error("Agent error: {0}")]
    Agent(String),

    /// Fatal problem found while building the gateway or its connection
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request was rejected before any backend call
    #[error("Invalid request: {0}")]
    Validation(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
