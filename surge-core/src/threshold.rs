use crate::{metrics, MetricsSnapshot, Quantile, MIN_THRESHOLD_SAMPLES};
use std::fmt;
use std::time::Duration;

/// A pass/fail expression over aggregated run metrics, e.g.
/// `http_req_failed.rate < 0.05` or `http_req_duration.p95 < 300ms`.
///
/// Bare numeric limits on duration metrics are read as milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSpec {
    pub metric: MetricPath,
    pub comparator: Comparator,
    pub limit: f64,
    pub abort_on_fail: bool,
    expr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricPath {
    /// `http_req_failed.rate`
    ErrorRate,
    /// `http_req_duration.p50|p90|p95|p99`, in milliseconds
    Latency(Quantile),
    /// `http_reqs.count`
    RequestCount,
    /// `dropped_iterations.count`
    DroppedCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    fn holds(&self, observed: f64, limit: f64) -> bool {
        match self {
            Comparator::Lt => observed < limit,
            Comparator::Le => observed <= limit,
            Comparator::Gt => observed > limit,
            Comparator::Ge => observed >= limit,
        }
    }
}

/// Stateless verdict of one threshold against one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    /// Not enough samples yet to be eligible for a verdict either way.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdParseError {
    #[error("missing comparator in threshold `{0}`")]
    MissingComparator(String),
    #[error("unknown metric `{0}`")]
    UnknownMetric(String),
    #[error("invalid limit `{0}`")]
    InvalidLimit(String),
}

impl ThresholdSpec {
    pub fn parse(expr: &str, abort_on_fail: bool) -> Result<Self, ThresholdParseError> {
        let (lhs, comparator, rhs) = split_comparator(expr)
            .ok_or_else(|| ThresholdParseError::MissingComparator(expr.to_string()))?;

        let metric = parse_metric(lhs.trim())
            .ok_or_else(|| ThresholdParseError::UnknownMetric(lhs.trim().to_string()))?;
        let limit = parse_limit(rhs.trim(), metric)
            .ok_or_else(|| ThresholdParseError::InvalidLimit(rhs.trim().to_string()))?;

        Ok(Self {
            metric,
            comparator,
            limit,
            abort_on_fail,
            expr: expr.to_string(),
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// The metric's current value in the unit the limit was parsed in.
    pub fn observe(&self, snapshot: &MetricsSnapshot) -> f64 {
        match self.metric {
            MetricPath::ErrorRate => snapshot.error_rate(),
            MetricPath::Latency(q) => snapshot.latency(q).as_secs_f64() * 1_000.,
            MetricPath::RequestCount => snapshot.completed() as f64,
            MetricPath::DroppedCount => snapshot.dropped as f64,
        }
    }

    /// Evaluate against a snapshot. Below the minimum sample count the
    /// verdict is `Unresolved`: a thin sample must not be reported as a pass.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Verdict {
        if snapshot.total() < MIN_THRESHOLD_SAMPLES {
            return Verdict::Unresolved;
        }
        if self.comparator.holds(self.observe(snapshot), self.limit) {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

impl fmt::Display for ThresholdSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

fn split_comparator(expr: &str) -> Option<(&str, Comparator, &str)> {
    // Two-char comparators first so `<=` does not parse as `<`.
    for (token, comparator) in [
        ("<=", Comparator::Le),
        (">=", Comparator::Ge),
        ("<", Comparator::Lt),
        (">", Comparator::Gt),
    ] {
        if let Some(idx) = expr.find(token) {
            let (lhs, rest) = expr.split_at(idx);
            return Some((lhs, comparator, &rest[token.len()..]));
        }
    }
    None
}

fn parse_metric(path: &str) -> Option<MetricPath> {
    let (series, field) = path.split_once('.')?;
    // Accept the k6 spelling `p(95)` alongside `p95`.
    let field = field.replace(['(', ')'], "");
    match (series, field.as_str()) {
        (metrics::FAILED, "rate") => Some(MetricPath::ErrorRate),
        (metrics::REQUESTS, "count") => Some(MetricPath::RequestCount),
        (metrics::DROPPED, "count") => Some(MetricPath::DroppedCount),
        (metrics::DURATION, "p50") => Some(MetricPath::Latency(Quantile::P50)),
        (metrics::DURATION, "p90") => Some(MetricPath::Latency(Quantile::P90)),
        (metrics::DURATION, "p95") => Some(MetricPath::Latency(Quantile::P95)),
        (metrics::DURATION, "p99") => Some(MetricPath::Latency(Quantile::P99)),
        _ => None,
    }
}

fn parse_limit(raw: &str, metric: MetricPath) -> Option<f64> {
    if let Ok(value) = raw.parse::<f64>() {
        return value.is_finite().then_some(value);
    }
    // Duration limits like `300ms` or `1s 500ms`, normalized to the
    // millisecond unit latency metrics are compared in.
    if matches!(metric, MetricPath::Latency(_)) {
        let dur: Duration = humantime::parse_duration(raw).ok()?;
        return Some(dur.as_secs_f64() * 1_000.);
    }
    None
}
