use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which kind of backend a gateway talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// A raw generation endpoint streaming newline-delimited JSON
    Native,
    /// An agent runtime over an OpenAI-compatible chat-completions provider
    Agent,
}

// Unified enum to wrap the backend configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Ollama(OllamaProviderConfig),
    OpenAi(OpenAiProviderConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            ProviderConfig::Ollama(_) => BackendKind::Native,
            ProviderConfig::OpenAi(_) => BackendKind::Agent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub timeout_secs: u64,
    /// Whether agents built on this connection stream their replies
    pub streaming: bool,
}
