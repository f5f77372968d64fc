//! Real-time job progress channel.
//!
//! Decodes the server's job event envelopes, resolves the stream URL from
//! the stored settings, and keeps a WebSocket connection alive with a
//! bounded backoff schedule. Consumers receive typed [`JobEvent`]s through
//! a broadcast subscription.

pub mod channel;
pub mod events;
pub mod messages;
pub mod reconnect;
pub mod resolver;
pub mod source;

pub use channel::{JobChannel, RESOLVE_FAILURE_REASON};
pub use events::JobEvent;
pub use reconnect::BackoffSchedule;
pub use resolver::UrlResolver;
pub use source::JobEventSource;
