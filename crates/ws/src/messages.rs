//! Job stream envelope types and decoder.
//!
//! The server sends JSON text frames shaped `{"type": "<kind>", "payload": {...}}`.
//! Every payload field is optional on the wire; which fields are required
//! depends on the `type`, so decoding happens in two steps: parse the
//! loose [`Envelope`], then map it to a [`JobEvent`].

use serde::Deserialize;

use crate::events::JobEvent;
use jobstream_core::types::JobId;

pub const MSG_TYPE_CONNECTED: &str = "job.connected";
pub const MSG_TYPE_PROGRESS: &str = "job.progress";
pub const MSG_TYPE_COMPLETED: &str = "job.completed";
pub const MSG_TYPE_FAILED: &str = "job.failed";

/// Wire wrapper around a single job event.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<Payload>,
}

/// Union of all payload fields used by the known event types.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub job_id: Option<JobId>,
    pub progress: Option<i32>,
    pub phase: Option<String>,
    pub message: Option<String>,
    pub download_url: Option<String>,
    pub checksum: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Decode a text frame into a [`JobEvent`].
///
/// Returns `None` for malformed JSON, unknown `type` values, and job
/// events whose payload has no `jobId`. Such frames are expected while
/// the protocol evolves and are never surfaced as errors.
pub fn decode(text: &str) -> Option<JobEvent> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::trace!(error = %e, "Dropping malformed job stream frame");
            return None;
        }
    };

    match envelope.kind.as_str() {
        MSG_TYPE_CONNECTED => Some(JobEvent::Connected),
        MSG_TYPE_PROGRESS => envelope.payload.and_then(|p| {
            Some(JobEvent::Progress {
                job_id: p.job_id?,
                progress: p.progress.unwrap_or(0),
                phase: p.phase,
                message: p.message,
            })
        }),
        MSG_TYPE_COMPLETED => envelope.payload.and_then(|p| {
            Some(JobEvent::Completed {
                job_id: p.job_id?,
                download_url: p.download_url,
                checksum: p.checksum,
            })
        }),
        MSG_TYPE_FAILED => envelope.payload.and_then(|p| {
            Some(JobEvent::Failed {
                job_id: p.job_id?,
                error_code: p.error_code,
                error_message: p.error_message,
            })
        }),
        other => {
            tracing::trace!(kind = %other, "Dropping unknown job stream frame");
            None
        }
    }
}
