use std::time::Duration;

/// Workers created eagerly at run start when not otherwise configured.
pub const DEFAULT_PREALLOCATED_VUS: usize = 10;

/// Per-iteration timeout when not otherwise configured.
pub const DEFAULT_ITERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the drain phase waits for in-flight iterations before
/// force-cancelling them.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Cadence of threshold evaluation against the live metrics.
pub const THRESHOLD_INTERVAL: Duration = Duration::from_secs(1);

/// Outcomes required before a threshold is eligible for a verdict.
pub const MIN_THRESHOLD_SAMPLES: u64 = 30;
