use crate::state::AppState;
use axum::{extract::State, response::Json, routing::get, Router};
use parley::gateway::{GatewayStats, HealthReport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Banner {
    message: String,
    version: String,
}

async fn root() -> Json<Banner> {
    Json(Banner {
        message: "Parley chat gateway is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.gateway.health_check().await)
}

async fn stats(State(state): State<AppState>) -> Json<GatewayStats> {
    Json(state.gateway.stats())
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}
