use std::time::Duration;
use surge_core::{Segment, StageSchedule};

/// Lazy sequence of fire offsets for an open-loop arrival process.
///
/// The Nth tick fires at the time where the integral of the schedule's rate
/// reaches N. Within one linear segment the integral is quadratic, so the
/// clock inverts it in closed form segment by segment; the long-run average
/// rate therefore matches the configured stages exactly, including during
/// ramps. Intervals with zero rate produce no ticks, and the sequence ends
/// once the schedule is exhausted.
///
/// Pure arithmetic over elapsed offsets; the dispatcher anchors the offsets
/// to wall-clock time.
pub(crate) struct ArrivalClock {
    segments: Vec<Segment>,
    segment: usize,
    /// Arrivals accumulated in segments before `segment`.
    carried: f64,
    /// 1-based index of the next arrival.
    next_arrival: u64,
}

impl ArrivalClock {
    pub fn new(schedule: &StageSchedule) -> Self {
        Self {
            segments: schedule.segments().collect(),
            segment: 0,
            carried: 0.,
            next_arrival: 1,
        }
    }
}

impl Iterator for ArrivalClock {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let n = self.next_arrival as f64;
        loop {
            let segment = self.segments.get(self.segment)?;
            let within = n - self.carried;
            // Tolerate float error at segment ends so the boundary arrival
            // is not skipped.
            if within > segment.arrivals() + 1e-9 {
                self.carried += segment.arrivals();
                self.segment += 1;
                continue;
            }
            let offset = segment.offset_for(within);
            self.next_arrival += 1;
            return Some(Duration::from_secs_f64(segment.start + offset));
        }
    }
}
