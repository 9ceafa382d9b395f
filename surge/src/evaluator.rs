use crate::sink::MetricsSink;
use arc_swap::ArcSwap;
use std::sync::Arc;
use surge_core::{
    MetricsSnapshot, ThresholdSpec, ThresholdStatus, Verdict, THRESHOLD_INTERVAL,
};
use tokio::sync::watch;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Periodically evaluates the configured thresholds against live snapshots.
///
/// Statuses are republished through an `ArcSwap` on every pass so readers
/// (the controller, tests) never contend with the evaluation loop. A failure
/// is sticky: a threshold that failed mid-run stays failed in the final
/// report even if the metric later recovers. Abort-enabled thresholds signal
/// the run controller through the abort channel on their first failure.
pub(crate) struct ThresholdEvaluator {
    specs: Vec<ThresholdSpec>,
    sink: Arc<MetricsSink>,
    statuses: Arc<ArcSwap<Vec<ThresholdStatus>>>,
    abort: watch::Sender<bool>,
}

impl ThresholdEvaluator {
    pub fn new(
        specs: Vec<ThresholdSpec>,
        sink: Arc<MetricsSink>,
        abort: watch::Sender<bool>,
    ) -> Self {
        Self {
            specs,
            sink,
            statuses: Arc::new(ArcSwap::from_pointee(Vec::new())),
            abort,
        }
    }

    /// Shared handle to the most recently published statuses. Readable
    /// lock-free while the evaluator keeps writing.
    pub fn statuses(&self) -> Arc<ArcSwap<Vec<ThresholdStatus>>> {
        self.statuses.clone()
    }

    pub async fn run(self) {
        if self.specs.is_empty() {
            return;
        }

        let mut interval = tokio::time::interval(THRESHOLD_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        interval.tick().await;

        loop {
            interval.tick().await;
            let snapshot = self.sink.snapshot();
            trace!(%snapshot, "threshold pass");

            let previous = self.statuses.load();
            let statuses = evaluate_all(&self.specs, &snapshot, Some(&previous));

            for status in statuses.iter().filter(|s| s.verdict == Verdict::Fail) {
                if status.spec.abort_on_fail && !*self.abort.borrow() {
                    warn!("threshold `{}` failed, aborting run", status.spec);
                    let _ = self.abort.send(true);
                }
            }

            self.statuses.store(Arc::new(statuses));
        }
    }
}

/// One evaluation pass. `previous` carries the sticky failures from earlier
/// passes; pass `None` for a standalone evaluation.
pub(crate) fn evaluate_all(
    specs: &[ThresholdSpec],
    snapshot: &MetricsSnapshot,
    previous: Option<&[ThresholdStatus]>,
) -> Vec<ThresholdStatus> {
    specs
        .iter()
        .enumerate()
        .map(|(idx, spec)| {
            let mut verdict = spec.evaluate(snapshot);
            let failed_before = previous
                .and_then(|statuses| statuses.get(idx))
                .is_some_and(|status| status.verdict == Verdict::Fail);
            if failed_before {
                verdict = Verdict::Fail;
            }
            ThresholdStatus {
                spec: spec.clone(),
                verdict,
                observed: spec.observe(snapshot),
            }
        })
        .collect()
}
