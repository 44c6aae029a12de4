use parley::gateway::ChatGateway;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ChatGateway>,
}

impl AppState {
    pub fn new(gateway: ChatGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}
