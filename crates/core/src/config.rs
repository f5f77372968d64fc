use std::time::Duration;

use crate::error::CoreError;

/// Base address used until the user stores one.
pub const DEFAULT_BASE_URL: &str = "http://10.0.2.2:8080";

/// Default reconnect delays, indexed by consecutive-failure count.
pub const DEFAULT_BACKOFF_MS: [u64; 4] = [1_000, 2_000, 4_000, 8_000];

/// Default capacity of the job event broadcast buffer.
pub const DEFAULT_EVENT_BUFFER: usize = 16;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local emulator setup.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Fallback server address (default: `http://10.0.2.2:8080`).
    pub base_url: String,
    /// Initial bearer credential, if one is provided up front.
    pub token: Option<String>,
    /// Reconnect delays (default: `1s, 2s, 4s, 8s`).
    pub backoff: Vec<Duration>,
    /// Broadcast buffer size for job events (default: `16`).
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            backoff: DEFAULT_BACKOFF_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                  |
    /// |--------------------------|--------------------------|
    /// | `JOBSTREAM_BASE_URL`     | `http://10.0.2.2:8080`   |
    /// | `JOBSTREAM_TOKEN`        | unset                    |
    /// | `JOBSTREAM_BACKOFF_MS`   | `1000,2000,4000,8000`    |
    /// | `JOBSTREAM_EVENT_BUFFER` | `16`                     |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// Split out from [`from_env`](Self::from_env) so tests do not have to
    /// mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("JOBSTREAM_BASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.base_url);

        let token = lookup("JOBSTREAM_TOKEN")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let backoff = match lookup("JOBSTREAM_BACKOFF_MS") {
            Some(raw) => parse_backoff(&raw)?,
            None => defaults.backoff,
        };

        let event_buffer = match lookup("JOBSTREAM_EVENT_BUFFER") {
            Some(raw) => raw.trim().parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
                CoreError::Config(format!(
                    "JOBSTREAM_EVENT_BUFFER must be a positive integer, got '{raw}'"
                ))
            })?,
            None => defaults.event_buffer,
        };

        Ok(Self {
            base_url,
            token,
            backoff,
            event_buffer,
        })
    }
}

/// Parse a comma-separated list of millisecond delays.
fn parse_backoff(raw: &str) -> Result<Vec<Duration>, CoreError> {
    let delays = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                CoreError::Config(format!("JOBSTREAM_BACKOFF_MS entry '{s}' is not a u64"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if delays.is_empty() {
        return Err(CoreError::Config(
            "JOBSTREAM_BACKOFF_MS must list at least one delay".to_string(),
        ));
    }
    Ok(delays)
}
