use tokio::sync::broadcast;

use crate::events::JobEvent;

/// A controllable stream of [`JobEvent`]s.
///
/// [`JobChannel`](crate::channel::JobChannel) is the production
/// implementation; tests substitute an in-memory source.
pub trait JobEventSource: Send + Sync {
    /// Receive every event published after this call. Nothing published
    /// earlier is replayed.
    fn subscribe(&self) -> broadcast::Receiver<JobEvent>;

    /// Begin (or restart) delivering events.
    fn start(&self);

    /// Stop delivering events until the next [`start`](Self::start).
    fn stop(&self);
}
