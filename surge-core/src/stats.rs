use crate::{MetricsSnapshot, ThresholdSpec, Verdict};
use std::fmt;

/// Final state of one configured threshold.
#[derive(Debug, Clone)]
pub struct ThresholdStatus {
    pub spec: ThresholdSpec,
    pub verdict: Verdict,
    /// Last observed value, in the unit the limit was parsed in.
    pub observed: f64,
}

impl fmt::Display for ThresholdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match self.verdict {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Unresolved => "UNRESOLVED",
        };
        write!(f, "{verdict} {} (observed {:.2})", self.spec, self.observed)
    }
}

/// Report produced at the end of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot: MetricsSnapshot,
    pub thresholds: Vec<ThresholdStatus>,
    /// True when the run was cut short by an abort-on-fail threshold.
    pub aborted: bool,
}

impl RunReport {
    /// No threshold failed. Unresolved thresholds do not count as passes,
    /// but they do not fail the run either.
    pub fn passed(&self) -> bool {
        !self
            .thresholds
            .iter()
            .any(|t| t.verdict == Verdict::Fail)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.snapshot)?;
        for threshold in &self.thresholds {
            writeln!(f, "  {threshold}")?;
        }
        if self.aborted {
            writeln!(f, "  run aborted early by a failing threshold")?;
        }
        Ok(())
    }
}
