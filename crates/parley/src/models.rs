//! These models represent the objects passed through the gateway
//!
//! There are a few related formats we need to interact with:
//! - chat requests, sent from the transport layer to the gateway
//! - gateway events, sent from the gateway back to the transport layer
//! - openai chat messages, sent from the agent to the model connection
//! - ollama generate lines, read by the native client
//!
//! The provider formats are converted at the edge in `providers`, so only the
//! request, event and message types here cross module boundaries.
pub mod event;
pub mod message;
pub mod request;
pub mod role;
