/// Server-assigned job identifiers are 64-bit integers.
pub type JobId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
