//! Metric series names shared by the sink, the thresholds and the exporters.

pub const REQUESTS: &str = "http_reqs";
pub const FAILED: &str = "http_req_failed";
pub const DURATION: &str = "http_req_duration";
pub const DROPPED: &str = "dropped_iterations";
