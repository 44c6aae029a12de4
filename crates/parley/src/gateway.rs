//! The gateway routes each chat request to the configured backend and
//! normalizes whatever comes back into one event protocol.
//!
//! Streams always follow `start, content*, (end | error)`:
//! - `start` is emitted before any backend I/O
//! - agent backends produce cumulative `content` events, each one resending
//!   the whole reply so far
//! - native backends produce one `content` event per fragment, carrying the
//!   fragment as the provider reported it
//! - backend faults become a single terminal `error` event
use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::agent::DEFAULT_AGENT_NAME;
use crate::errors::{GatewayError, GatewayResult};
use crate::models::event::GatewayEvent;
use crate::models::message::Message;
use crate::models::request::ChatRequest;
use crate::providers::base::ModelClient;
use crate::providers::configs::{BackendKind, ProviderConfig};
use crate::providers::factory;
use crate::providers::ollama::OllamaClient;
use crate::runtime::AgentRuntime;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer questions in \
detail, say so honestly when you are unsure, keep a friendly and professional tone, give \
clear code examples for programming questions and explain complex problems step by step.";

const HEALTH_CHECK_PROMPT: &str = "Hello";
const HEALTH_CHECK_SYSTEM_PROMPT: &str = "You are a helpful assistant. Reply with 'OK'.";
const HEALTH_CHECK_PREVIEW_CHARS: usize = 50;

/// The backend a gateway talks to, fixed when the gateway is built
#[derive(Clone)]
pub enum Backend {
    Native(OllamaClient),
    Agent(AgentRuntime),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Native(_) => BackendKind::Native,
            Backend::Agent(_) => BackendKind::Agent,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Backend::Native(client) => client.model(),
            Backend::Agent(runtime) => runtime.client().model(),
        }
    }

    pub fn base_url(&self) -> &str {
        match self {
            Backend::Native(client) => client.base_url(),
            Backend::Agent(runtime) => runtime.client().base_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub backend: BackendKind,
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayStats {
    pub backend: BackendKind,
    pub model: String,
    pub base_url: String,
    pub agent_count: usize,
}

pub struct ChatGateway {
    backend: Backend,
    system_prompt: String,
    agent_name: String,
}

impl ChatGateway {
    pub fn new<S: Into<String>>(backend: Backend, system_prompt: S) -> Self {
        Self {
            backend,
            system_prompt: system_prompt.into(),
            agent_name: DEFAULT_AGENT_NAME.to_string(),
        }
    }

    pub fn with_agent_name<S: Into<String>>(mut self, agent_name: S) -> Self {
        self.agent_name = agent_name.into();
        self
    }

    /// Build the backend from configuration and prepare the default agent
    ///
    /// Any failure here is fatal to the process.
    pub fn from_config<S: Into<String>>(
        config: ProviderConfig,
        system_prompt: S,
        agent_name: Option<String>,
    ) -> GatewayResult<Self> {
        let mut gateway = Self::new(factory::get_backend(config)?, system_prompt);
        if let Some(agent_name) = agent_name {
            gateway = gateway.with_agent_name(agent_name);
        }

        if let Backend::Agent(runtime) = &gateway.backend {
            runtime.agent(&gateway.agent_name, &gateway.system_prompt);
        }
        info!(
            "Gateway using {} backend, model {} at {}",
            gateway.backend.kind(),
            gateway.backend.model(),
            gateway.backend.base_url()
        );
        Ok(gateway)
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Answer a request in one piece
    ///
    /// Only validation fails; backend faults are turned into an apology so
    /// callers always get text back.
    pub async fn complete_once(&self, request: &ChatRequest) -> GatewayResult<String> {
        request.validate()?;

        match self.answer(request).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                error!("Chat completion failed: {}", e);
                Ok(format!(
                    "Sorry, an error occurred while processing your request: {}",
                    e
                ))
            }
        }
    }

    async fn answer(&self, request: &ChatRequest) -> GatewayResult<String> {
        let system_prompt = request.system_prompt_or(&self.system_prompt);
        match &self.backend {
            Backend::Native(client) => client.complete(&request.text, Some(system_prompt)).await,
            Backend::Agent(runtime) => {
                let agent = runtime.agent(&self.agent_name, system_prompt);
                runtime.run_once(&agent, &request.text).await
            }
        }
    }

    /// Answer a request as a stream of events
    ///
    /// Validation happens before the stream is returned. Nothing touches the
    /// backend until the stream is polled past `start`.
    pub fn complete_stream(
        &self,
        request: ChatRequest,
    ) -> GatewayResult<BoxStream<'static, GatewayEvent>> {
        request.validate()?;

        let system_prompt = request.system_prompt_or(&self.system_prompt).to_string();
        Ok(events(
            self.backend.clone(),
            self.agent_name.clone(),
            system_prompt,
            request,
        )
        .boxed())
    }

    /// Probe the backend with a tiny completion
    ///
    /// The agent path calls the model connection directly so the agent cache
    /// is left alone.
    pub async fn health_check(&self) -> HealthReport {
        let result = match &self.backend {
            Backend::Native(client) => {
                client
                    .complete(HEALTH_CHECK_PROMPT, Some(HEALTH_CHECK_SYSTEM_PROMPT))
                    .await
            }
            Backend::Agent(runtime) => {
                let messages = [
                    Message::system().with_text(HEALTH_CHECK_SYSTEM_PROMPT),
                    Message::user().with_text(HEALTH_CHECK_PROMPT),
                ];
                runtime
                    .client()
                    .complete(&messages)
                    .await
                    .map(|(message, _)| message.content)
            }
        };

        let (status, test_response, error) = match result {
            Ok(reply) => (
                HealthStatus::Healthy,
                Some(reply.chars().take(HEALTH_CHECK_PREVIEW_CHARS).collect()),
                None,
            ),
            Err(e) => {
                warn!("Health check failed: {}", e);
                (HealthStatus::Unhealthy, None, Some(e.to_string()))
            }
        };

        HealthReport {
            status,
            backend: self.backend.kind(),
            model: self.backend.model().to_string(),
            base_url: self.backend.base_url().to_string(),
            test_response,
            error,
            timestamp: Utc::now(),
        }
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            backend: self.backend.kind(),
            model: self.backend.model().to_string(),
            base_url: self.backend.base_url().to_string(),
            agent_count: self.agent_count(),
        }
    }

    pub fn agent_count(&self) -> usize {
        match &self.backend {
            Backend::Native(_) => 0,
            Backend::Agent(runtime) => runtime.cache().count(),
        }
    }

    /// Release cached agents during shutdown
    pub fn close(&self) {
        if let Backend::Agent(runtime) = &self.backend {
            runtime.cache().clear();
        }
        info!("Gateway closed");
    }
}

fn events(
    backend: Backend,
    agent_name: String,
    system_prompt: String,
    request: ChatRequest,
) -> impl Stream<Item = GatewayEvent> {
    stream! {
        let conversation_id = request.conversation_id.clone();
        yield GatewayEvent::start(conversation_id.clone());

        let (mut fragments, cumulative) = match &backend {
            Backend::Native(client) => {
                match client.stream(&request.text, Some(&system_prompt)).await {
                    Ok(fragments) => (fragments, false),
                    Err(e) => {
                        error!("Stream chat failed: {}", e);
                        yield stream_error(&e, conversation_id);
                        return;
                    }
                }
            }
            Backend::Agent(runtime) => {
                let agent = runtime.agent(&agent_name, &system_prompt);
                (runtime.run_stream(agent, request.text.clone()), true)
            }
        };

        let mut accumulated = String::new();
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) if cumulative => {
                    accumulated.push_str(&text);
                    yield GatewayEvent::content(accumulated.clone(), conversation_id.clone());
                }
                // ollama closes the stream with an empty response
                Ok(text) if text.is_empty() => continue,
                Ok(text) => {
                    yield GatewayEvent::content(text, conversation_id.clone());
                }
                Err(e) => {
                    error!("Stream chat failed: {}", e);
                    yield stream_error(&e, conversation_id);
                    return;
                }
            }
        }

        info!("Stream chat completed");
        yield GatewayEvent::end(conversation_id);
    }
}

fn stream_error(e: &GatewayError, conversation_id: Option<String>) -> GatewayEvent {
    GatewayEvent::error(format!("Error while streaming the reply: {}", e), conversation_id)
}
