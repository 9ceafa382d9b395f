use metrics_util::AtomicBucket;
use pdatastructs::tdigest::{TDigest, K1};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use surge_core::{metrics as labels, ErrorKind, MetricsSnapshot, Outcome, Quantile};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Concurrent accumulator for iteration outcomes.
///
/// Writers only touch atomics and the lock-free latency bucket, so recording
/// from many completing iterations never contends. `snapshot()` drains the
/// bucket into a t-digest under a mutex; that critical section is bounded by
/// the number of samples since the previous snapshot and is only ever
/// contended by other snapshotters.
pub(crate) struct MetricsSink {
    started: Instant,
    success: AtomicU64,
    target_errors: AtomicU64,
    timeouts: AtomicU64,
    cancelled: AtomicU64,
    dropped: AtomicU64,
    latency: AtomicBucket<Duration>,
    digest: Mutex<TDigest<K1>>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            success: AtomicU64::new(0),
            target_errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            latency: AtomicBucket::new(),
            digest: Mutex::new(default_tdigest()),
        }
    }

    /// Folds one outcome into the counters. Called once per scheduled
    /// arrival, from whichever task produced the outcome.
    pub fn record(&self, outcome: &Outcome) {
        match outcome.error {
            None => self.success.fetch_add(1, Ordering::Relaxed),
            Some(ErrorKind::Target) => self.target_errors.fetch_add(1, Ordering::Relaxed),
            Some(ErrorKind::Timeout) => self.timeouts.fetch_add(1, Ordering::Relaxed),
            Some(ErrorKind::Cancelled) => self.cancelled.fetch_add(1, Ordering::Relaxed),
            Some(ErrorKind::PoolExhausted) => self.dropped.fetch_add(1, Ordering::Relaxed),
        };

        // Drops never reached the target; a zero latency for them would
        // only distort the distribution.
        if !outcome.is_dropped() {
            self.latency.push(outcome.latency);
        }

        self.emit(outcome);
    }

    #[cfg(feature = "metrics")]
    fn emit(&self, outcome: &Outcome) {
        if outcome.is_dropped() {
            metrics::counter!(labels::DROPPED).increment(1);
            return;
        }
        metrics::counter!(labels::REQUESTS).increment(1);
        if !outcome.success {
            metrics::counter!(labels::FAILED).increment(1);
        }
        metrics::histogram!(labels::DURATION).record(outcome.latency.as_nanos() as f64);
    }

    #[cfg(not(feature = "metrics"))]
    fn emit(&self, _outcome: &Outcome) {}

    /// Consistent point-in-time view. The counter total is derived from the
    /// per-class counters, so `total == success + failure + dropped` holds
    /// on every snapshot by construction.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut digest = self.digest.lock().unwrap();
        self.latency.clear_with(|durs| {
            for latency in durs {
                digest.insert(latency.as_secs_f64());
            }
        });

        let timeouts = self.timeouts.load(Ordering::Relaxed);
        let cancelled = self.cancelled.load(Ordering::Relaxed);
        let target_errors = self.target_errors.load(Ordering::Relaxed);

        MetricsSnapshot {
            success: self.success.load(Ordering::Relaxed),
            failure: timeouts + cancelled + target_errors,
            dropped: self.dropped.load(Ordering::Relaxed),
            timeouts,
            cancelled,
            target_errors,
            latency_p50: quantile(&digest, Quantile::P50),
            latency_p90: quantile(&digest, Quantile::P90),
            latency_p95: quantile(&digest, Quantile::P95),
            latency_p99: quantile(&digest, Quantile::P99),
            elapsed: self.started.elapsed(),
        }
    }
}

fn quantile(digest: &TDigest<K1>, q: Quantile) -> Duration {
    let secs = digest.quantile(q.as_f64());
    // The digest returns NaN when it holds no samples yet.
    if secs.is_finite() {
        Duration::from_secs_f64(secs.max(0.))
    } else {
        Duration::ZERO
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}
