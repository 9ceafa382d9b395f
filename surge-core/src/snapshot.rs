use std::fmt;
use std::time::Duration;

/// Point-in-time view of the run's accumulated metrics.
///
/// Derived from the sink's counters and latency digest on every poll and
/// thrown away afterwards; never mutated.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub success: u64,
    pub failure: u64,
    pub dropped: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub target_errors: u64,
    pub latency_p50: Duration,
    pub latency_p90: Duration,
    pub latency_p95: Duration,
    pub latency_p99: Duration,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Every scheduled arrival accounted for: served, failed or dropped.
    pub fn total(&self) -> u64 {
        self.success + self.failure + self.dropped
    }

    /// Iterations that actually ran (drops never reached the target).
    pub fn completed(&self) -> u64 {
        self.success + self.failure
    }

    /// Failed fraction of the iterations that ran.
    pub fn error_rate(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            0.
        } else {
            self.failure as f64 / completed as f64
        }
    }

    pub fn latency(&self, quantile: Quantile) -> Duration {
        match quantile {
            Quantile::P50 => self.latency_p50,
            Quantile::P90 => self.latency_p90,
            Quantile::P95 => self.latency_p95,
            Quantile::P99 => self.latency_p99,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantile {
    P50,
    P90,
    P95,
    P99,
}

impl Quantile {
    pub fn as_f64(&self) -> f64 {
        match self {
            Quantile::P50 => 0.5,
            Quantile::P90 => 0.9,
            Quantile::P95 => 0.95,
            Quantile::P99 => 0.99,
        }
    }
}

impl fmt::Display for Quantile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantile::P50 => write!(f, "p50"),
            Quantile::P90 => write!(f, "p90"),
            Quantile::P95 => write!(f, "p95"),
            Quantile::P99 => write!(f, "p99"),
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} success={} failed={} dropped={} error_rate={:.2}% p50={:?} p95={:?} p99={:?} elapsed={}",
            self.total(),
            self.success,
            self.failure,
            self.dropped,
            self.error_rate() * 100.,
            self.latency_p50,
            self.latency_p95,
            self.latency_p99,
            humantime::format_duration(Duration::from_secs(self.elapsed.as_secs())),
        )
    }
}
