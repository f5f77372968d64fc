use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jobstream_core::job::{ExportKind, JobSnapshot};
use jobstream_core::types::JobId;

use crate::client::ApiError;

/// Job operations the tracker needs from the server.
///
/// Implemented by [`JobApi`](crate::client::JobApi) for real traffic and
/// by in-memory fakes in tests.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Fetch the current detail of one job.
    async fn fetch_job_detail(&self, job_id: JobId) -> Result<JobSnapshot, ApiError>;

    /// Ask the server to start an export job for `target_id` and return
    /// the id of the created job.
    async fn request_export(&self, kind: ExportKind, target_id: i64) -> Result<JobId, ApiError>;

    /// Stream a finished job's result into `destination`.
    async fn download_result(&self, job_id: JobId, destination: &Path)
        -> Result<PathBuf, ApiError>;
}
