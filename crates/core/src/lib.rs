//! Shared domain types for the job-stream client.
//!
//! Holds the job model returned by the REST API, the settings provider
//! abstractions read by the WebSocket resolver and the REST client, and
//! the environment-driven [`config::ClientConfig`].

pub mod config;
pub mod error;
pub mod job;
pub mod settings;
pub mod types;
