use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;

use crate::agent::{Agent, AgentEvent};
use crate::agent_cache::AgentCache;
use crate::errors::{GatewayError, GatewayResult};
use crate::providers::base::ModelClient;

/// Runs agent turns and reduces whatever they emit to plain reply text
#[derive(Clone)]
pub struct AgentRuntime {
    client: Arc<dyn ModelClient>,
    cache: Arc<AgentCache>,
}

impl AgentRuntime {
    pub fn new(client: Arc<dyn ModelClient>, streaming: bool) -> Self {
        Self {
            cache: Arc::new(AgentCache::new(client.clone(), streaming)),
            client,
        }
    }

    pub fn client(&self) -> &Arc<dyn ModelClient> {
        &self.client
    }

    pub fn cache(&self) -> &AgentCache {
        &self.cache
    }

    pub fn agent(&self, name: &str, system_prompt: &str) -> Arc<Agent> {
        self.cache.get_or_create(name, system_prompt)
    }

    /// Run a full turn and return the text of its last message
    pub async fn run_once(&self, agent: &Agent, task: &str) -> GatewayResult<String> {
        let result = agent.run(task).await?;
        result.last_text().map(String::from).ok_or_else(|| {
            GatewayError::Agent(format!("Agent {} produced no message content", agent.name()))
        })
    }

    /// Run a turn and forward only its text deltas
    ///
    /// An agent that does not stream reports its reply once, on completion.
    pub fn run_stream(
        &self,
        agent: Arc<Agent>,
        task: String,
    ) -> BoxStream<'static, GatewayResult<String>> {
        let streaming = agent.streaming();
        agent
            .run_stream(task)
            .filter_map(move |event| async move {
                match event {
                    Ok(AgentEvent::TextDelta(text)) => Some(Ok(text)),
                    Ok(AgentEvent::Completed(result)) if !streaming => {
                        result.last_text().map(|text| Ok(text.to_string()))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::DEFAULT_AGENT_NAME;
    use crate::providers::base::ModelDelta;
    use crate::providers::mock::MockModelClient;
    use futures::TryStreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_run_once() -> GatewayResult<()> {
        let runtime = AgentRuntime::new(Arc::new(MockModelClient::with_text(&[&["Hello"]])), true);
        let agent = runtime.agent(DEFAULT_AGENT_NAME, "P");
        assert_eq!(runtime.run_once(&agent, "Hi").await?, "Hello");
        Ok(())
    }

    #[tokio::test]
    async fn test_run_once_without_content_is_agent_error() {
        let runtime = AgentRuntime::new(Arc::new(MockModelClient::with_text(&[&[]])), true);
        let agent = runtime.agent(DEFAULT_AGENT_NAME, "P");
        let err = runtime.run_once(&agent, "Hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::Agent(_)));
    }

    #[tokio::test]
    async fn test_run_stream_forwards_only_text() -> GatewayResult<()> {
        let runtime = AgentRuntime::new(Arc::new(MockModelClient::new(vec![vec![
            Ok(ModelDelta::Reasoning("plan".to_string())),
            Ok(ModelDelta::Text("Hel".to_string())),
            Ok(ModelDelta::ToolCall(json!({"id": "call_1"}))),
            Ok(ModelDelta::Text("lo".to_string())),
        ]])), true);
        let agent = runtime.agent(DEFAULT_AGENT_NAME, "P");

        let fragments: Vec<String> = runtime
            .run_stream(agent, "Hi".to_string())
            .try_collect()
            .await?;
        assert_eq!(fragments, vec!["Hel", "lo"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_run_stream_forwards_errors() {
        let runtime = AgentRuntime::new(Arc::new(MockModelClient::new(vec![vec![Err(
            GatewayError::Transport("reset".to_string()),
        )]])), true);
        let agent = runtime.agent(DEFAULT_AGENT_NAME, "P");

        let items: Vec<GatewayResult<String>> =
            runtime.run_stream(agent, "Hi".to_string()).collect().await;
        assert_eq!(items, vec![Err(GatewayError::Transport("reset".to_string()))]);
    }

    #[tokio::test]
    async fn test_run_stream_without_streaming_sends_the_reply_once() -> GatewayResult<()> {
        let runtime = AgentRuntime::new(
            Arc::new(MockModelClient::with_text(&[&["Hel", "lo"]])),
            false,
        );
        let agent = runtime.agent(DEFAULT_AGENT_NAME, "P");
        assert!(!agent.streaming());

        let fragments: Vec<String> = runtime
            .run_stream(agent, "Hi".to_string())
            .try_collect()
            .await?;
        assert_eq!(fragments, vec!["Hello"]);
        Ok(())
    }
}
