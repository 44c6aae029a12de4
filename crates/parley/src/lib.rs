pub mod agent;
pub mod agent_cache;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod providers;
pub mod runtime;
