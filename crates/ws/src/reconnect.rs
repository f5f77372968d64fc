//! Bounded backoff schedule for job stream reconnection.
//!
//! Delays are an explicit ordered list indexed by the number of
//! consecutive failed sessions. Once the attempt counter reaches the last
//! entry it stays there, so retries continue forever at the ceiling delay.

use std::time::Duration;

use jobstream_core::config::DEFAULT_BACKOFF_MS;

/// Ordered reconnect delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

/// Returned when a schedule would have no entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("backoff schedule must contain at least one delay")]
pub struct EmptyScheduleError;

impl BackoffSchedule {
    pub fn new(delays: Vec<Duration>) -> Result<Self, EmptyScheduleError> {
        if delays.is_empty() {
            return Err(EmptyScheduleError);
        }
        Ok(Self { delays })
    }

    /// Schedule with every entry equal to zero, used to retry immediately.
    pub fn immediate(len: usize) -> Self {
        Self {
            delays: vec![Duration::ZERO; len.max(1)],
        }
    }

    /// Delay before the retry that follows failure number `attempt`.
    ///
    /// Attempts past the end of the schedule use the last entry.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let last = self.delays.len() - 1;
        self.delays[attempt.min(last)]
    }

    /// Attempt counter after one more failure, saturating at the last
    /// index of the schedule.
    pub fn next_attempt(&self, attempt: usize) -> usize {
        (attempt + 1).min(self.delays.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}

impl Default for BackoffSchedule {
    /// `1s, 2s, 4s, 8s`.
    fn default() -> Self {
        Self {
            delays: DEFAULT_BACKOFF_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}
