//! Typed job events published by the channel.
//!
//! Produced by [`decode`](crate::messages::decode) for inbound frames and
//! by the channel itself for connection lifecycle changes.

use jobstream_core::types::JobId;

/// One event on the job stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// The connection was established (or the server greeted us).
    Connected,

    /// The connection was lost or could not be opened.
    Disconnected { reason: Option<String> },

    /// A job made progress.
    Progress {
        job_id: JobId,
        /// Completion percentage (0-100).
        progress: i32,
        phase: Option<String>,
        message: Option<String>,
    },

    /// A job finished successfully.
    Completed {
        job_id: JobId,
        download_url: Option<String>,
        checksum: Option<String>,
    },

    /// A job failed.
    Failed {
        job_id: JobId,
        error_code: Option<String>,
        error_message: Option<String>,
    },
}

impl JobEvent {
    /// The job this event refers to, or `None` for connection events.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Connected | Self::Disconnected { .. } => None,
            Self::Progress { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => Some(*job_id),
        }
    }

    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self::Disconnected {
            reason: Some(reason.into()),
        }
    }
}
