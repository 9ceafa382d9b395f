use crate::{
    Stage, StageSchedule, ThresholdParseError, ThresholdSpec, DEFAULT_GRACE_PERIOD,
    DEFAULT_ITERATION_TIMEOUT, DEFAULT_PREALLOCATED_VUS,
};
use std::fmt;
use std::time::Duration;

/// Full configuration for one run. Owned by the run controller; read-only
/// once the run starts.
///
/// Malformed values are rejected by [`RunConfig::schedule`] and
/// [`RunConfig::validate`] before any tick is scheduled.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub name: String,
    pub start_rate: f64,
    pub stages: Vec<Stage>,
    pub preallocated_vus: usize,
    pub max_vus: Option<usize>,
    pub iteration_timeout: Duration,
    pub grace_period: Duration,
    pub thresholds: Vec<ThresholdExpr>,
}

/// A threshold expression as configured, parsed at validation time.
#[derive(Debug, Clone)]
pub struct ThresholdExpr {
    pub expr: String,
    pub abort_on_fail: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("arrival rate must be finite and non-negative, got {0}")]
    InvalidRate(f64),
    #[error("schedule must contain at least one stage")]
    EmptySchedule,
    #[error("preallocated_vus must be greater than zero")]
    NoPreallocatedVus,
    #[error("max_vus ({max}) must be at least preallocated_vus ({preallocated})")]
    VuCapBelowPreallocation { max: usize, preallocated: usize },
    #[error(transparent)]
    Threshold(#[from] ThresholdParseError),
}

impl RunConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start_rate: 0.,
            stages: vec![],
            preallocated_vus: DEFAULT_PREALLOCATED_VUS,
            max_vus: None,
            iteration_timeout: DEFAULT_ITERATION_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
            thresholds: vec![],
        }
    }

    /// Worker cap; defaults to the preallocated count, never below it.
    pub fn max_vus(&self) -> usize {
        self.max_vus.unwrap_or(self.preallocated_vus)
    }

    pub fn schedule(&self) -> Result<StageSchedule, ConfigError> {
        StageSchedule::new(self.start_rate, self.stages.clone())
    }

    pub fn parse_thresholds(&self) -> Result<Vec<ThresholdSpec>, ConfigError> {
        self.thresholds
            .iter()
            .map(|t| Ok(ThresholdSpec::parse(&t.expr, t.abort_on_fail)?))
            .collect()
    }

    /// Checks everything that is fatal at run start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preallocated_vus == 0 {
            return Err(ConfigError::NoPreallocatedVus);
        }
        if self.max_vus() < self.preallocated_vus {
            return Err(ConfigError::VuCapBelowPreallocation {
                max: self.max_vus(),
                preallocated: self.preallocated_vus,
            });
        }
        self.schedule()?;
        self.parse_thresholds()?;
        Ok(())
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} stage(s), start_rate={}, vus={}/{}, timeout={}",
            self.name,
            self.stages.len(),
            self.start_rate,
            self.preallocated_vus,
            self.max_vus(),
            humantime::format_duration(self.iteration_timeout),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RunConfig {
        let mut config = RunConfig::new("test");
        config.start_rate = 1.;
        config.stages = vec![Stage::new(10., Duration::from_secs(5))];
        config
    }

    #[test]
    fn default_config_with_stages_is_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn max_vus_defaults_to_preallocated() {
        let config = base();
        assert_eq!(config.max_vus(), config.preallocated_vus);
    }

    #[test]
    fn rejects_zero_preallocation() {
        let mut config = base();
        config.preallocated_vus = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoPreallocatedVus));
    }

    #[test]
    fn rejects_cap_below_preallocation() {
        let mut config = base();
        config.preallocated_vus = 20;
        config.max_vus = Some(10);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::VuCapBelowPreallocation { .. })
        ));
    }

    #[test]
    fn rejects_empty_schedule() {
        let mut config = base();
        config.stages.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptySchedule));
    }

    #[test]
    fn rejects_bad_threshold_expressions() {
        let mut config = base();
        config.thresholds.push(ThresholdExpr {
            expr: "nope".to_string(),
            abort_on_fail: false,
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Threshold(_))
        ));
    }
}
