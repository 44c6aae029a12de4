use std::sync::Arc;

use super::configs::ProviderConfig;
use super::ollama::OllamaClient;
use super::openai::OpenAiClient;
use crate::errors::GatewayResult;
use crate::gateway::Backend;
use crate::runtime::AgentRuntime;

/// Build the backend a gateway will route every request to
pub fn get_backend(config: ProviderConfig) -> GatewayResult<Backend> {
    match config {
        ProviderConfig::Ollama(ollama_config) => {
            Ok(Backend::Native(OllamaClient::new(ollama_config)?))
        }
        ProviderConfig::OpenAi(openai_config) => {
            let streaming = openai_config.streaming;
            let client = Arc::new(OpenAiClient::new(openai_config)?);
            Ok(Backend::Agent(AgentRuntime::new(client, streaming)))
        }
    }
}
