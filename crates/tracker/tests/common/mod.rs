//! In-memory fakes for the tracker's collaborators.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jobstream_api::{ApiError, JobRepository};
use jobstream_core::job::{ExportKind, JobSnapshot, JobStatus};
use jobstream_core::types::JobId;
use jobstream_tracker::JobView;
use jobstream_ws::{JobEvent, JobEventSource};
use tokio::sync::{broadcast, watch};

pub const RESULT_BYTES: &[u8] = b"fake-result";

/// Event source driven by the test through [`emit`](Self::emit).
pub struct FakeJobEventSource {
    tx: broadcast::Sender<JobEvent>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeJobEventSource {
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(64);
        Arc::new(Self {
            tx,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    pub fn emit(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl JobEventSource for FakeJobEventSource {
    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Repository answering from a queue of scripted detail responses.
///
/// When the queue is empty, detail fetches return [`running`] for the
/// requested job.
pub struct FakeJobRepository {
    details: Mutex<VecDeque<Result<JobSnapshot, ApiError>>>,
    detail_calls: AtomicUsize,
    fail_download: AtomicBool,
}

impl FakeJobRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            details: Mutex::new(VecDeque::new()),
            detail_calls: AtomicUsize::new(0),
            fail_download: AtomicBool::new(false),
        })
    }

    pub fn push_detail(&self, response: Result<JobSnapshot, ApiError>) {
        self.details.lock().unwrap().push_back(response);
    }

    pub fn fail_downloads(&self) {
        self.fail_download.store(true, Ordering::SeqCst);
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobRepository for FakeJobRepository {
    async fn fetch_job_detail(&self, job_id: JobId) -> Result<JobSnapshot, ApiError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.details.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(running(job_id)))
    }

    async fn request_export(&self, _kind: ExportKind, target_id: i64) -> Result<JobId, ApiError> {
        Ok(target_id * 10)
    }

    async fn download_result(
        &self,
        _job_id: JobId,
        destination: &Path,
    ) -> Result<PathBuf, ApiError> {
        if self.fail_download.load(Ordering::SeqCst) {
            return Err(server_error("download failed"));
        }
        tokio::fs::write(destination, RESULT_BYTES).await?;
        Ok(destination.to_path_buf())
    }
}

/// The snapshot the fake server reports for a job still encoding.
pub fn running(job_id: JobId) -> JobSnapshot {
    JobSnapshot {
        job_type: Some("REPLAY_MP4".into()),
        status: Some(JobStatus::Running),
        progress: Some(5),
        download_url: Some(format!("/api/jobs/{job_id}/result")),
        ..JobSnapshot::bare(job_id)
    }
}

pub fn server_error(body: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        body: body.to_string(),
    }
}

/// Let spawned tasks run until they have nothing left to do.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Wait until the view satisfies `pred`, panicking after a few seconds.
pub async fn wait_for_view<F>(rx: &mut watch::Receiver<JobView>, pred: F) -> JobView
where
    F: FnMut(&JobView) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for the job view")
        .expect("tracker dropped")
        .clone()
}
