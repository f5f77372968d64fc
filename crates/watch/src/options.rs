//! Watch-specific settings read from the environment.
//!
//! Connection settings (base URL, token, backoff) come from
//! [`ClientConfig`](jobstream_core::config::ClientConfig); this module only
//! covers which job to follow and where to put its result.

use std::path::PathBuf;

use jobstream_core::job::ExportKind;
use jobstream_core::types::JobId;

/// Which job the watcher follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSelection {
    /// An existing job, by id.
    Existing(JobId),
    /// A job created on startup by requesting an export of a replay.
    Export { kind: ExportKind, replay_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    pub selection: JobSelection,
    /// Where to download the result once the job completes.
    pub download_dir: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    #[error("set WATCH_JOB_ID, or WATCH_EXPORT_KIND and WATCH_REPLAY_ID")]
    NoJobSelected,

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl WatchOptions {
    pub fn from_env() -> Result<Self, OptionsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build options from an arbitrary variable lookup.
    ///
    /// `WATCH_JOB_ID` wins over an export request when both are set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OptionsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let selection = if let Some(raw) = var("WATCH_JOB_ID") {
            JobSelection::Existing(parse_id("WATCH_JOB_ID", &raw)?)
        } else {
            match (var("WATCH_EXPORT_KIND"), var("WATCH_REPLAY_ID")) {
                (Some(kind), Some(replay)) => JobSelection::Export {
                    kind: kind.trim().parse().map_err(|reason| OptionsError::Invalid {
                        name: "WATCH_EXPORT_KIND",
                        value: kind.clone(),
                        reason,
                    })?,
                    replay_id: parse_id("WATCH_REPLAY_ID", &replay)?,
                },
                _ => return Err(OptionsError::NoJobSelected),
            }
        };

        Ok(Self {
            selection,
            download_dir: var("WATCH_DOWNLOAD_DIR").map(PathBuf::from),
        })
    }
}

fn parse_id(name: &'static str, raw: &str) -> Result<i64, OptionsError> {
    raw.trim().parse().map_err(|e: std::num::ParseIntError| OptionsError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
