use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use parley::{errors::GatewayError, models::event::GatewayEvent, models::request::ChatRequest};
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

// Types matching the incoming JSON structure
#[derive(Debug, Deserialize, Serialize)]
struct ChatBody {
    message: String,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    system_message: Option<String>,
}

impl ChatBody {
    fn into_request(self) -> ChatRequest {
        ChatRequest {
            text: self.message,
            conversation_id: self.conversation_id,
            system_prompt: self.system_message,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatReply {
    response: String,
    conversation_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

// Server-sent events body fed from a channel
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = axum::body::Body::from_stream(self);

        let mut response = Response::new(body);
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        response
    }
}

/// Frames gateway events as server-sent events
pub struct SseFramer;

impl SseFramer {
    pub fn format_event(event: &GatewayEvent) -> String {
        let encoded = serde_json::to_string(event).unwrap_or_else(|e| {
            tracing::error!("Failed to encode event: {}", e);
            String::from("{}")
        });
        format!("data: {}\n\n", encoded)
    }

    pub fn done() -> String {
        String::from("data: [DONE]\n\n")
    }
}

fn error_response(err: GatewayError) -> Response {
    let status = match err {
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

async fn chat_handler(State(state): State<AppState>, Json(body): Json<ChatBody>) -> Response {
    let mut request = body.into_request();
    let conversation_id = request
        .conversation_id
        .take()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let request = request.with_conversation_id(conversation_id.clone());

    match state.gateway.complete_once(&request).await {
        Ok(response) => Json(ChatReply {
            response,
            conversation_id,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn stream_handler(State(state): State<AppState>, Json(body): Json<ChatBody>) -> Response {
    let mut events = match state.gateway.complete_stream(body.into_request()) {
        Ok(events) => events,
        Err(e) => return error_response(e),
    };

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if tx.send(SseFramer::format_event(&event)).await.is_err() {
                tracing::debug!("Client went away, dropping the rest of the stream");
                return;
            }
        }
        let _ = tx.send(SseFramer::done()).await;
    });

    SseResponse::new(ReceiverStream::new(rx)).into_response()
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(stream_handler))
        .with_state(state)
}
