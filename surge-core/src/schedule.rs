use crate::ConfigError;
use std::time::Duration;

/// One ramp segment: move the arrival rate linearly to `target`
/// iterations/sec over `duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stage {
    pub target: f64,
    pub duration: Duration,
}

impl Stage {
    pub fn new(target: f64, duration: Duration) -> Self {
        Self { target, duration }
    }
}

/// Piecewise-linear arrival-rate curve over elapsed run time.
///
/// Stage N ramps from the end rate of stage N-1 (`start_rate` for stage 0) to
/// its own `target`. Immutable once a run starts; all evaluation is a pure
/// function of elapsed time.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSchedule {
    start_rate: f64,
    stages: Vec<Stage>,
}

impl StageSchedule {
    pub fn new(start_rate: f64, stages: Vec<Stage>) -> Result<Self, ConfigError> {
        if stages.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        for rate in std::iter::once(start_rate).chain(stages.iter().map(|s| s.target)) {
            if !rate.is_finite() || rate < 0. {
                return Err(ConfigError::InvalidRate(rate));
            }
        }
        Ok(Self { start_rate, stages })
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Expected arrivals over the whole schedule (the integral of the rate).
    pub fn total_arrivals(&self) -> f64 {
        self.segments().map(|s| s.arrivals()).sum()
    }

    /// Instantaneous arrival rate at `elapsed`.
    ///
    /// A zero-duration stage is a step change: its target applies at the
    /// boundary itself. At or past the total duration the rate is 0 and the
    /// run is considered finished.
    pub fn rate_at(&self, elapsed: Duration) -> f64 {
        let t = elapsed.as_secs_f64();
        if t >= self.total_duration().as_secs_f64() {
            return 0.;
        }

        let mut rate = self.start_rate;
        let mut start = 0.;
        for stage in &self.stages {
            let dur = stage.duration.as_secs_f64();
            if dur == 0. {
                // Step change; applies to the boundary instant itself.
                if t >= start {
                    rate = stage.target;
                }
                continue;
            }
            let end = start + dur;
            if t < end {
                return rate + (stage.target - rate) * (t - start) / dur;
            }
            rate = stage.target;
            start = end;
        }
        0.
    }

    /// The non-degenerate linear segments of the curve, with entry rates
    /// chained across any zero-duration steps in between.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        let mut rate = self.start_rate;
        let mut start = 0.;
        self.stages.iter().filter_map(move |stage| {
            let dur = stage.duration.as_secs_f64();
            let rate_in = rate;
            rate = stage.target;
            if dur == 0. {
                return None;
            }
            let seg = Segment {
                start,
                duration: dur,
                rate_in,
                rate_out: stage.target,
            };
            start += dur;
            Some(seg)
        })
    }
}

/// One linear piece of the rate curve, in seconds from run start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub duration: f64,
    pub rate_in: f64,
    pub rate_out: f64,
}

impl Segment {
    /// Arrivals accumulated across the whole segment (trapezoid area).
    pub fn arrivals(&self) -> f64 {
        (self.rate_in + self.rate_out) / 2. * self.duration
    }

    /// Offset into the segment at which cumulative arrivals reach `n`.
    ///
    /// The cumulative count is quadratic in the offset, so this is the
    /// positive root of `rate_in * u + slope * u^2 / 2 = n`. Callers must
    /// ensure `0 < n <= self.arrivals()`.
    pub fn offset_for(&self, n: f64) -> f64 {
        let slope = (self.rate_out - self.rate_in) / self.duration;
        let offset = if slope.abs() < f64::EPSILON {
            n / self.rate_in
        } else {
            let disc = (self.rate_in * self.rate_in + 2. * slope * n).max(0.);
            (disc.sqrt() - self.rate_in) / slope
        };
        offset.clamp(0., self.duration)
    }
}
