use jobstream_api::ApiError;

/// Errors returned by [`JobTracker`](crate::JobTracker) operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The operation needs a tracked job and `start()` was never called.
    #[error("no job is being tracked")]
    NotTracking,

    #[error(transparent)]
    Api(#[from] ApiError),
}
