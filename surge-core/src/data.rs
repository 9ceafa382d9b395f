use std::time::Duration;

/// What the target reported back for one successful unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetResponse {
    pub status: Option<u16>,
}

impl TargetResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status: Some(status),
        }
    }

    /// A success with no protocol status attached (non-HTTP targets).
    pub fn empty() -> Self {
        Self { status: None }
    }
}

/// Failure reported by the target or the transport underneath it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    #[error("target returned status {0}")]
    Status(u16),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// What one iteration of user work resolves to.
pub type IterationResult = Result<TargetResponse, TargetError>;

/// Identity handed to the iteration function for one arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationContext {
    /// Id of the worker slot lent out for this iteration.
    pub worker: usize,
    /// Global tick number, starting at 0.
    pub iteration: u64,
}

/// Iteration-level error classes. All of these are recorded, none of them
/// stop the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The scheduled arrival found no idle worker and the pool was at its
    /// cap. The tick is dropped, never queued.
    PoolExhausted,
    /// The iteration exceeded the configured timeout.
    Timeout,
    /// The run was aborted while the iteration was in flight.
    Cancelled,
    /// The target reported failure.
    Target,
}

/// The result of one scheduled arrival, recorded exactly once.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub success: bool,
    pub status: Option<u16>,
    pub latency: Duration,
    pub error: Option<ErrorKind>,
}

impl Outcome {
    pub fn from_result(latency: Duration, result: IterationResult) -> Self {
        match result {
            Ok(response) => Self {
                success: true,
                status: response.status,
                latency,
                error: None,
            },
            Err(err) => {
                let status = match err {
                    TargetError::Status(code) => Some(code),
                    TargetError::Transport(_) => None,
                };
                Self {
                    success: false,
                    status,
                    latency,
                    error: Some(ErrorKind::Target),
                }
            }
        }
    }

    /// A tick that never ran because the pool was exhausted.
    pub fn dropped() -> Self {
        Self {
            success: false,
            status: None,
            latency: Duration::ZERO,
            error: Some(ErrorKind::PoolExhausted),
        }
    }

    pub fn timeout(latency: Duration) -> Self {
        Self {
            success: false,
            status: None,
            latency,
            error: Some(ErrorKind::Timeout),
        }
    }

    pub fn cancelled(latency: Duration) -> Self {
        Self {
            success: false,
            status: None,
            latency,
            error: Some(ErrorKind::Cancelled),
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self.error, Some(ErrorKind::PoolExhausted))
    }
}
