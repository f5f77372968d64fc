//! Reconciled view of one tracked job and the rules that fold REST
//! snapshots and stream events into it.
//!
//! Everything here is synchronous and side-effect free; [`JobTracker`]
//! decides when to call these methods and acts on the returned
//! [`EventOutcome`].
//!
//! Terminal statuses (`COMPLETED`, `FAILED`) latch: once the view has
//! seen one, neither a late progress event nor a stale REST snapshot can
//! move the job back to a non-terminal status.
//!
//! [`JobTracker`]: crate::tracker::JobTracker

use std::path::PathBuf;

use jobstream_core::job::{JobSnapshot, JobStatus};
use jobstream_core::types::JobId;
use jobstream_ws::JobEvent;

/// Phase and message from the latest progress event.
///
/// Not part of the server snapshot: replaced by the next progress event
/// and cleared on completion or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNote {
    pub phase: Option<String>,
    pub message: Option<String>,
}

/// Current state of a tracked job, as shown to the consumer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobView {
    /// The job being tracked, `None` until `start()`.
    pub job_id: Option<JobId>,
    /// Last known job state; kept when a refresh fails.
    pub snapshot: Option<JobSnapshot>,
    /// At least one REST fetch is in flight.
    pub is_loading: bool,
    /// Last REST error, cleared by the next successful fetch.
    pub error_message: Option<String>,
    pub is_connected: bool,
    pub last_disconnect_reason: Option<String>,
    pub progress_note: Option<ProgressNote>,
    pub is_downloading: bool,
    pub downloaded_path: Option<PathBuf>,
    /// Fetches started by `begin_fetch` that have not reported back.
    fetches_in_flight: usize,
}

/// What applying an event did to the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// The view differs from before the event.
    pub changed: bool,
    /// The job to re-fetch because the stream just came back.
    pub refresh: Option<JobId>,
}

impl JobView {
    /// Fresh view for `job_id` with nothing loaded yet.
    pub fn tracking(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            ..Default::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.snapshot.as_ref().is_some_and(JobSnapshot::is_terminal)
    }

    /// Fold one stream event into the view.
    pub fn apply_event(&mut self, event: &JobEvent) -> EventOutcome {
        let before = self.clone();
        let mut refresh = None;

        match event {
            JobEvent::Connected => {
                let was_connected = self.is_connected;
                self.is_connected = true;
                self.last_disconnect_reason = None;
                // Edge-triggered: only the first `Connected` after a gap
                // refetches, to pick up anything missed while offline.
                if !was_connected {
                    refresh = self.job_id;
                }
            }
            JobEvent::Disconnected { reason } => {
                self.is_connected = false;
                self.last_disconnect_reason = reason.clone();
            }
            JobEvent::Progress {
                job_id,
                progress,
                phase,
                message,
            } => {
                if self.tracks(*job_id) && !self.is_terminal() {
                    let snapshot = self.snapshot_for(*job_id);
                    if snapshot.status.is_none() {
                        snapshot.status = Some(JobStatus::Running);
                    }
                    snapshot.progress = Some((*progress).clamp(0, 100));
                    snapshot.error_message = None;
                    self.progress_note = if phase.is_none() && message.is_none() {
                        None
                    } else {
                        Some(ProgressNote {
                            phase: phase.clone(),
                            message: message.clone(),
                        })
                    };
                }
            }
            JobEvent::Completed {
                job_id,
                download_url,
                checksum,
            } => {
                if self.tracks(*job_id) {
                    self.apply_completed(*job_id, download_url, checksum);
                }
            }
            JobEvent::Failed {
                job_id,
                error_code,
                error_message,
            } => {
                if self.tracks(*job_id) {
                    self.apply_failed(*job_id, error_code, error_message);
                }
            }
        }

        EventOutcome {
            changed: *self != before,
            refresh,
        }
    }

    /// Mark a REST fetch as in flight.
    ///
    /// Fetches may overlap; `is_loading` stays set until every one of
    /// them has reported back.
    pub fn begin_fetch(&mut self) {
        self.fetches_in_flight += 1;
        self.is_loading = true;
        self.error_message = None;
    }

    /// Replace the snapshot with a REST result.
    ///
    /// The fetched snapshot wins for every field except that a terminal
    /// status already seen here is never replaced by a non-terminal one;
    /// in that case status, progress and the terminal fields are kept.
    pub fn apply_snapshot(&mut self, fetched: JobSnapshot) {
        self.finish_fetch();
        self.error_message = None;

        let mut merged = fetched;
        if let Some(current) = self.snapshot.as_ref() {
            if current.is_terminal() && !merged.is_terminal() {
                tracing::debug!(
                    job_id = merged.job_id,
                    kept = ?current.status,
                    fetched = ?merged.status,
                    "Ignoring stale non-terminal status from refresh",
                );
                merged.status = current.status.clone();
                merged.progress = current.progress;
                keep_if_set(&mut merged.download_url, &current.download_url);
                keep_if_set(&mut merged.checksum, &current.checksum);
                keep_if_set(&mut merged.error_code, &current.error_code);
                keep_if_set(&mut merged.error_message, &current.error_message);
            }
        }

        if merged.is_terminal() {
            self.progress_note = None;
        }
        self.snapshot = Some(merged);
    }

    /// Record a failed REST fetch, keeping the last known snapshot.
    pub fn apply_fetch_error(&mut self, message: impl Into<String>) {
        self.finish_fetch();
        self.error_message = Some(message.into());
    }

    // ---- private helpers ----

    fn finish_fetch(&mut self) {
        self.fetches_in_flight = self.fetches_in_flight.saturating_sub(1);
        self.is_loading = self.fetches_in_flight > 0;
    }

    /// Job events count only for the tracked job.
    fn tracks(&self, job_id: JobId) -> bool {
        self.job_id == Some(job_id)
    }

    /// The snapshot to mutate, synthesized if no fetch has landed yet.
    fn snapshot_for(&mut self, job_id: JobId) -> &mut JobSnapshot {
        self.snapshot.get_or_insert_with(|| JobSnapshot::bare(job_id))
    }

    fn apply_completed(
        &mut self,
        job_id: JobId,
        download_url: &Option<String>,
        checksum: &Option<String>,
    ) {
        let snapshot = self.snapshot_for(job_id);
        match snapshot.status {
            Some(JobStatus::Failed) => return,
            Some(JobStatus::Completed) => {
                fill_if_absent(&mut snapshot.download_url, download_url);
                fill_if_absent(&mut snapshot.checksum, checksum);
            }
            _ => {
                snapshot.status = Some(JobStatus::Completed);
                snapshot.progress = Some(100);
                if download_url.is_some() {
                    snapshot.download_url = download_url.clone();
                }
                if checksum.is_some() {
                    snapshot.checksum = checksum.clone();
                }
            }
        }
        self.progress_note = None;
    }

    fn apply_failed(
        &mut self,
        job_id: JobId,
        error_code: &Option<String>,
        error_message: &Option<String>,
    ) {
        let snapshot = self.snapshot_for(job_id);
        match snapshot.status {
            Some(JobStatus::Completed) => return,
            Some(JobStatus::Failed) => {
                fill_if_absent(&mut snapshot.error_code, error_code);
                fill_if_absent(&mut snapshot.error_message, error_message);
            }
            _ => {
                snapshot.status = Some(JobStatus::Failed);
                snapshot.error_code = error_code.clone();
                snapshot.error_message = error_message.clone();
            }
        }
        self.progress_note = None;
    }
}

/// Overwrite `target` with `current` when `current` holds a value.
fn keep_if_set(target: &mut Option<String>, current: &Option<String>) {
    if current.is_some() {
        target.clone_from(current);
    }
}

/// Set `target` from `incoming` only when `target` is still empty.
fn fill_if_absent(target: &mut Option<String>, incoming: &Option<String>) {
    if target.is_none() {
        target.clone_from(incoming);
    }
}
