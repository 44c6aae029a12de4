use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::agent::Agent;
use crate::providers::base::ModelClient;

/// Identity of a cached agent: its name and a digest of its system prompt
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentKey {
    pub name: String,
    pub prompt_hash: String,
}

impl AgentKey {
    pub fn new(name: &str, system_prompt: &str) -> Self {
        let digest = Sha256::digest(system_prompt.as_bytes());
        Self {
            name: name.to_string(),
            prompt_hash: format!("{:x}", digest),
        }
    }
}

/// Memoizes agents so requests with the same persona reuse one instance
///
/// Entries are never evicted; the cache grows with the number of distinct
/// (name, system prompt) pairs seen by the process.
pub struct AgentCache {
    client: Arc<dyn ModelClient>,
    streaming: bool,
    agents: Mutex<HashMap<AgentKey, Arc<Agent>>>,
}

impl AgentCache {
    pub fn new(client: Arc<dyn ModelClient>, streaming: bool) -> Self {
        Self {
            client,
            streaming,
            agents: Mutex::new(HashMap::new()),
        }
    }

    fn agents(&self) -> MutexGuard<'_, HashMap<AgentKey, Arc<Agent>>> {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the agent for this name and prompt, creating it on first use
    ///
    /// Construction happens under the lock, so concurrent callers with the
    /// same key always receive the same instance.
    pub fn get_or_create(&self, name: &str, system_prompt: &str) -> Arc<Agent> {
        let key = AgentKey::new(name, system_prompt);
        let mut agents = self.agents();
        agents
            .entry(key)
            .or_insert_with_key(|key| {
                tracing::info!("Created agent {} ({})", key.name, &key.prompt_hash[..12]);
                Arc::new(Agent::new(
                    name,
                    system_prompt,
                    self.client.clone(),
                    self.streaming,
                ))
            })
            .clone()
    }

    /// Drop every cached agent; the model connection stays open
    pub fn clear(&self) {
        self.agents().clear();
        tracing::info!("Agent cache cleared");
    }

    pub fn count(&self) -> usize {
        self.agents().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::DEFAULT_AGENT_NAME;
    use crate::providers::mock::MockModelClient;

    fn cache() -> AgentCache {
        AgentCache::new(Arc::new(MockModelClient::new(Vec::new())), true)
    }

    #[test]
    fn test_agent_key() {
        let key = AgentKey::new("chat_assistant", "P1");
        assert_eq!(key, AgentKey::new("chat_assistant", "P1"));
        assert_ne!(key, AgentKey::new("chat_assistant", "P2"));
        assert_ne!(key, AgentKey::new("other", "P1"));
        assert_eq!(key.prompt_hash.len(), 64);
    }

    #[test]
    fn test_same_key_returns_same_agent() {
        let cache = cache();
        let first = cache.get_or_create(DEFAULT_AGENT_NAME, "P1");
        let second = cache.get_or_create(DEFAULT_AGENT_NAME, "P1");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn test_different_prompt_adds_one_entry() {
        let cache = cache();
        let p1 = cache.get_or_create(DEFAULT_AGENT_NAME, "P1");
        let p2 = cache.get_or_create(DEFAULT_AGENT_NAME, "P2");
        assert!(!Arc::ptr_eq(&p1, &p2));
        assert_eq!(p2.system_prompt(), "P2");
        assert_eq!(p1.system_prompt(), "P1");
        assert_eq!(cache.count(), 2);

        cache.get_or_create("translator", "P1");
        assert_eq!(cache.count(), 3);
    }

    #[test]
    fn test_agents_follow_streaming_flag() {
        let cache = cache();
        assert!(cache.get_or_create(DEFAULT_AGENT_NAME, "P1").streaming());

        let cache = AgentCache::new(Arc::new(MockModelClient::new(Vec::new())), false);
        assert!(!cache.get_or_create(DEFAULT_AGENT_NAME, "P1").streaming());
    }

    #[test]
    fn test_clear() {
        let cache = cache();
        let agent = cache.get_or_create(DEFAULT_AGENT_NAME, "P1");
        cache.clear();
        assert_eq!(cache.count(), 0);

        // A fresh instance is built after clearing
        let rebuilt = cache.get_or_create(DEFAULT_AGENT_NAME, "P1");
        assert!(!Arc::ptr_eq(&agent, &rebuilt));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_converges() {
        let cache = Arc::new(cache());
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_create(DEFAULT_AGENT_NAME, "shared") })
            })
            .collect();

        let mut agents = Vec::new();
        for handle in handles {
            agents.push(handle.await.unwrap());
        }
        assert_eq!(cache.count(), 1);
        assert!(agents.iter().all(|agent| Arc::ptr_eq(agent, &agents[0])));
    }
}
