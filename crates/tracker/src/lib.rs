//! Reconciles REST snapshots with streamed job events into one view.
//!
//! [`JobTracker`] follows a single job: it fetches the job's detail when
//! tracking starts and again whenever the event stream reconnects, and
//! folds every stream event for that job into a [`JobView`] published
//! over a `tokio::sync::watch` channel.

pub mod error;
pub mod tracker;
pub mod view;

pub use error::TrackerError;
pub use tracker::JobTracker;
pub use view::{EventOutcome, JobView, ProgressNote};
