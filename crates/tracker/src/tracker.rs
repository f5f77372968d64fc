//! Async orchestration around [`JobView`].
//!
//! The tracker owns three kinds of work:
//!
//! - an event loop task draining the source's broadcast subscription,
//! - short-lived fetch tasks spawned by [`JobTracker::refresh`],
//! - downloads awaited directly by the caller.
//!
//! All of them mutate the view through the same `watch::Sender`, whose
//! `send_if_modified` closure is the only place state changes. Spawned
//! tasks hold a `Weak` reference and drop their result once the tracker
//! is shut down or gone.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use jobstream_api::{ApiError, JobRepository};
use jobstream_core::job::JobSnapshot;
use jobstream_core::types::JobId;
use jobstream_ws::{JobEvent, JobEventSource};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::error::TrackerError;
use crate::view::JobView;

/// Follows one job at a time and keeps its [`JobView`] current.
///
/// Must be created inside a Tokio runtime. Dropping the tracker shuts it
/// down.
pub struct JobTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    source: Arc<dyn JobEventSource>,
    repository: Arc<dyn JobRepository>,
    view_tx: watch::Sender<JobView>,
    /// Cancelled by `shutdown()`; stops the event loop and discards
    /// in-flight fetch results.
    shutdown: CancellationToken,
}

impl JobTracker {
    /// Create a tracker and subscribe to `source`.
    ///
    /// The subscription is taken here, before any `start()`, so the
    /// first `Connected` of the session is never missed.
    pub fn new(source: Arc<dyn JobEventSource>, repository: Arc<dyn JobRepository>) -> Self {
        let (view_tx, _) = watch::channel(JobView::default());
        let events = source.subscribe();
        let inner = Arc::new(TrackerInner {
            source,
            repository,
            view_tx,
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(observe_events(
            Arc::downgrade(&inner),
            events,
            inner.shutdown.clone(),
        ));

        Self { inner }
    }

    /// Begin tracking `job_id`: reset the view, fetch the job, and start
    /// the event source.
    ///
    /// Calling it again for the job already tracked does nothing.
    pub fn start(&self, job_id: JobId) {
        if self.inner.shutdown.is_cancelled() {
            tracing::warn!(job_id, "Ignoring start on a tracker that was shut down");
            return;
        }
        let already_tracked = self.inner.view_tx.borrow().job_id == Some(job_id);
        if already_tracked {
            tracing::debug!(job_id, "Job already tracked");
            return;
        }

        tracing::info!(job_id, "Tracking job");
        self.inner.view_tx.send_replace(JobView::tracking(job_id));
        self.inner.refresh(job_id);
        self.inner.source.start();
    }

    /// Fetch `job_id` again. Ignored unless it is the tracked job.
    pub fn refresh(&self, job_id: JobId) {
        self.inner.refresh(job_id);
    }

    /// Apply one event as if it came from the source.
    pub fn on(&self, event: JobEvent) {
        self.inner.on(event);
    }

    /// Copy of the current view.
    pub fn view(&self) -> JobView {
        self.inner.view_tx.borrow().clone()
    }

    /// Receiver that observes every view change from now on.
    pub fn subscribe(&self) -> watch::Receiver<JobView> {
        self.inner.view_tx.subscribe()
    }

    /// Download the tracked job's result into `directory` as
    /// `job-<id>-result.bin`.
    ///
    /// `is_downloading` is set for the duration of the transfer. On
    /// success the path is recorded in the view; on failure the error
    /// message is.
    pub async fn download_result(&self, directory: &Path) -> Result<PathBuf, TrackerError> {
        let job_id = self
            .inner
            .view_tx
            .borrow()
            .job_id
            .ok_or(TrackerError::NotTracking)?;
        let destination = directory.join(format!("job-{job_id}-result.bin"));

        self.inner.view_tx.send_modify(|view| {
            view.is_downloading = true;
            view.error_message = None;
        });
        tracing::info!(job_id, path = %destination.display(), "Downloading job result");

        let result = self
            .inner
            .repository
            .download_result(job_id, &destination)
            .await;

        self.inner.view_tx.send_if_modified(|view| {
            if view.job_id != Some(job_id) {
                return false;
            }
            view.is_downloading = false;
            match &result {
                Ok(path) => view.downloaded_path = Some(path.clone()),
                Err(e) => view.error_message = Some(e.to_string()),
            }
            true
        });

        match &result {
            Ok(path) => tracing::info!(job_id, path = %path.display(), "Job result downloaded"),
            Err(e) => tracing::error!(job_id, error = %e, "Job result download failed"),
        }
        result.map_err(TrackerError::from)
    }

    /// Stop the event source and discard any work still in flight.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        tracing::info!("Shutting down job tracker");
        self.inner.shutdown.cancel();
        self.inner.source.stop();
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl TrackerInner {
    fn on(self: &Arc<Self>, event: JobEvent) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let mut refresh = None;
        let changed = self.view_tx.send_if_modified(|view| {
            let outcome = view.apply_event(&event);
            refresh = outcome.refresh;
            outcome.changed
        });
        if changed {
            tracing::debug!(?event, "Job view updated");
        }

        if let Some(job_id) = refresh {
            tracing::debug!(job_id, "Stream connected, refreshing job");
            self.refresh(job_id);
        }
    }

    fn refresh(self: &Arc<Self>, job_id: JobId) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let tracked = self.view_tx.send_if_modified(|view| {
            if view.job_id != Some(job_id) {
                return false;
            }
            view.begin_fetch();
            true
        });
        if !tracked {
            tracing::debug!(job_id, "Ignoring refresh for a job that is not tracked");
            return;
        }

        let tracker = Arc::downgrade(self);
        let repository = Arc::clone(&self.repository);
        tokio::spawn(async move {
            let result = repository.fetch_job_detail(job_id).await;
            if let Some(inner) = tracker.upgrade() {
                inner.apply_fetch(job_id, result);
            }
        });
    }

    /// Re-fetch whatever job is tracked, if any.
    fn refresh_tracked(self: &Arc<Self>) {
        let job_id = self.view_tx.borrow().job_id;
        if let Some(job_id) = job_id {
            self.refresh(job_id);
        }
    }

    fn apply_fetch(&self, job_id: JobId, result: Result<JobSnapshot, ApiError>) {
        if self.shutdown.is_cancelled() {
            tracing::debug!(job_id, "Discarding fetch result after shutdown");
            return;
        }

        self.view_tx.send_if_modified(|view| {
            if view.job_id != Some(job_id) {
                tracing::debug!(job_id, "Discarding fetch result for a job no longer tracked");
                return false;
            }
            match result {
                Ok(snapshot) => {
                    tracing::debug!(job_id, status = ?snapshot.status, "Fetched job detail");
                    view.apply_snapshot(snapshot);
                }
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "Failed to fetch job detail");
                    view.apply_fetch_error(e.to_string());
                }
            }
            true
        });
    }
}

/// Drain the source subscription into the tracker until shutdown.
async fn observe_events(
    tracker: Weak<TrackerInner>,
    mut events: broadcast::Receiver<JobEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = events.recv() => received,
        };

        let Some(inner) = tracker.upgrade() else {
            break;
        };
        match received {
            Ok(event) => inner.on(event),
            Err(RecvError::Lagged(skipped)) => {
                // Missed events may include a terminal one; resync from REST.
                tracing::warn!(skipped, "Job event subscriber lagged");
                inner.refresh_tracked();
            }
            Err(RecvError::Closed) => {
                tracing::debug!("Job event source closed");
                break;
            }
        }
    }
    tracing::debug!("Job event loop finished");
}
