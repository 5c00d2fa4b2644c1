//! Environment controller tunables.

/// Number of workers processing distinct Environments concurrently.
pub const DEFAULT_WORKERS: usize = 2;

/// How often every Environment is re-enqueued, in seconds.
pub const DEFAULT_RESYNC_SECS: u64 = 300;

/// First retry delay after a failure, in milliseconds. Doubles per failure.
pub const BACKOFF_BASE_MILLIS: u64 = 5;

/// Upper bound on the retry delay, in seconds.
pub const BACKOFF_MAX_SECS: u64 = 1000;
