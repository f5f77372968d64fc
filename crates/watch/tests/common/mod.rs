//! Minimal collaborators for driving the watcher without a server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use jobstream_api::{ApiError, JobRepository};
use jobstream_core::job::{ExportKind, JobSnapshot, JobStatus};
use jobstream_core::types::JobId;
use jobstream_ws::{JobEvent, JobEventSource};
use tokio::sync::broadcast;

pub struct ScriptedSource {
    tx: broadcast::Sender<JobEvent>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(16);
        Arc::new(Self { tx })
    }

    pub fn emit(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}

impl JobEventSource for ScriptedSource {
    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    fn start(&self) {}

    fn stop(&self) {}
}

/// Reports every job as running; exports get id `replay * 100`.
pub struct RunningRepository;

#[async_trait]
impl JobRepository for RunningRepository {
    async fn fetch_job_detail(&self, job_id: JobId) -> Result<JobSnapshot, ApiError> {
        Ok(JobSnapshot {
            status: Some(JobStatus::Running),
            progress: Some(10),
            ..JobSnapshot::bare(job_id)
        })
    }

    async fn request_export(&self, _kind: ExportKind, target_id: i64) -> Result<JobId, ApiError> {
        Ok(target_id * 100)
    }

    async fn download_result(
        &self,
        _job_id: JobId,
        destination: &Path,
    ) -> Result<PathBuf, ApiError> {
        tokio::fs::write(destination, b"mp4").await?;
        Ok(destination.to_path_buf())
    }
}
