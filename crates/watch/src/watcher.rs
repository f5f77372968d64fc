//! Follows one job through the tracker and logs how it changes.

use std::path::{Path, PathBuf};

use jobstream_api::{ApiError, JobRepository};
use jobstream_core::job::JobStatus;
use jobstream_core::types::JobId;
use jobstream_tracker::{JobTracker, JobView, TrackerError};

use crate::options::JobSelection;

/// Turn the selection into a job id, requesting an export if asked to.
pub async fn resolve_job(
    repository: &dyn JobRepository,
    selection: &JobSelection,
) -> Result<JobId, ApiError> {
    match selection {
        JobSelection::Existing(job_id) => Ok(*job_id),
        JobSelection::Export { kind, replay_id } => {
            let job_id = repository.request_export(*kind, *replay_id).await?;
            tracing::info!(job_id, replay_id, kind = kind.path_segment(), "Export requested");
            Ok(job_id)
        }
    }
}

/// Start tracking `job_id` and wait until it reaches a terminal status.
///
/// Every view change is logged. Returns the first terminal view, or the
/// last view seen if the tracker goes away first.
pub async fn follow(tracker: &JobTracker, job_id: JobId) -> JobView {
    let mut rx = tracker.subscribe();
    tracker.start(job_id);

    loop {
        let view = rx.borrow_and_update().clone();
        log_view(&view);
        if view.is_terminal() {
            return view;
        }
        if rx.changed().await.is_err() {
            return view;
        }
    }
}

/// Download the result of a completed job into `directory`.
///
/// Returns `Ok(None)` when the job did not complete.
pub async fn download_if_completed(
    tracker: &JobTracker,
    view: &JobView,
    directory: &Path,
) -> Result<Option<PathBuf>, TrackerError> {
    let completed = view
        .snapshot
        .as_ref()
        .is_some_and(|s| s.status == Some(JobStatus::Completed));
    if !completed {
        return Ok(None);
    }
    tracker.download_result(directory).await.map(Some)
}

fn log_view(view: &JobView) {
    let Some(job_id) = view.job_id else {
        return;
    };
    let snapshot = view.snapshot.as_ref();
    let status = snapshot
        .and_then(|s| s.status.as_ref())
        .map_or("UNKNOWN", JobStatus::as_str);
    let progress = snapshot.and_then(|s| s.progress).unwrap_or(0);
    let note = view
        .progress_note
        .as_ref()
        .and_then(|n| n.message.as_deref())
        .unwrap_or("");

    tracing::info!(
        job_id,
        status,
        progress,
        connected = view.is_connected,
        loading = view.is_loading,
        note,
        "Job state",
    );

    if let Some(error) = &view.error_message {
        tracing::warn!(job_id, error = %error, "Job detail refresh failed");
    }
    if let Some(s) = snapshot.filter(|s| s.status == Some(JobStatus::Failed)) {
        tracing::error!(
            job_id,
            error_code = s.error_code.as_deref().unwrap_or(""),
            error_message = s.error_message.as_deref().unwrap_or(""),
            "Job failed",
        );
    }
}
