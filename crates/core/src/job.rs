//! Job model shared by the REST client and the state reconciler.
//!
//! The server serializes jobs with camelCase keys and leaves most fields
//! nullable, so every field except `job_id` is optional here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

/// Lifecycle status of a server-side job.
///
/// The server may introduce statuses this client does not know about;
/// those are preserved verbatim in [`JobStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    /// `true` for `Completed` and `Failed`. Terminal statuses never move
    /// back to a non-terminal one on the client.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => Self::Other(value),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detail view of a single job as returned by `GET /api/jobs/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// Completion percentage (0-100).
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub target_replay_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub ended_at: Option<Timestamp>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub result_uri: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl JobSnapshot {
    /// Placeholder snapshot used when a stream event arrives before any
    /// REST fetch has completed.
    pub fn bare(job_id: JobId) -> Self {
        Self {
            job_id,
            ..Default::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.as_ref().is_some_and(JobStatus::is_terminal)
    }
}

/// One page of `GET /api/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPage {
    #[serde(default)]
    pub items: Vec<JobSnapshot>,
    #[serde(default)]
    pub page: i32,
    #[serde(default)]
    pub size: i32,
    #[serde(default)]
    pub total_items: i64,
    #[serde(default)]
    pub total_pages: i32,
}

/// Kinds of export job that can be requested for a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Mp4,
    Thumbnail,
}

impl ExportKind {
    /// Final path segment of the export endpoint.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Thumbnail => "thumbnail",
        }
    }
}

impl std::str::FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "thumbnail" => Ok(Self::Thumbnail),
            other => Err(format!("unknown export kind '{other}'")),
        }
    }
}
