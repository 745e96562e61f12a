use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use crate::config::PlaybackConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Interval {
    period: Duration,
    next_due: Instant,
}

/// Repeating timers driven by the host's event loop.
///
/// Nothing fires on its own; the host calls [`IntervalTimers::due`] with the
/// current instant once per frame.
#[derive(Debug, Default)]
pub struct IntervalTimers {
    next_id: u64,
    intervals: BTreeMap<TimerId, Interval>,
}

impl IntervalTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_interval(&mut self, period: Duration, now: Instant) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let period = period.max(Duration::from_millis(1));
        self.intervals.insert(
            id,
            Interval {
                period,
                next_due: now + period,
            },
        );
        id
    }

    /// Returns whether a timer was actually cleared.
    pub fn clear_interval(&mut self, id: TimerId) -> bool {
        self.intervals.remove(&id).is_some()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.intervals.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.intervals.len()
    }

    /// Timers that elapsed by `now`, each re-armed one period later.
    ///
    /// A timer that fell several periods behind fires once, not once per
    /// missed period.
    pub fn due(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired = Vec::new();
        for (id, interval) in self.intervals.iter_mut() {
            if now >= interval.next_due {
                fired.push(*id);
                interval.next_due += interval.period;
                if interval.next_due <= now {
                    interval.next_due = now + interval.period;
                }
            }
        }
        fired
    }

    /// Earliest instant at which some timer fires.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.intervals.values().map(|interval| interval.next_due).min()
    }
}

/// How often progress is sampled while playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingPolicy {
    pub normal: Duration,
    pub low_power: Duration,
    pub prefer_low_power: bool,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self::from_config(&PlaybackConfig::default())
    }
}

impl SamplingPolicy {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            normal: config.sample_interval(),
            low_power: config.low_power_interval(),
            prefer_low_power: config.low_power,
        }
    }

    pub fn period(&self) -> Duration {
        if self.prefer_low_power {
            self.low_power
        } else {
            self.normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_each_period() {
        let start = Instant::now();
        let mut timers = IntervalTimers::new();
        let id = timers.set_interval(Duration::from_secs(1), start);

        assert!(timers.due(start + Duration::from_millis(999)).is_empty());
        assert_eq!(timers.due(start + Duration::from_secs(1)), vec![id]);
        assert!(timers.due(start + Duration::from_millis(1500)).is_empty());
        assert_eq!(timers.due(start + Duration::from_secs(2)), vec![id]);
    }

    #[test]
    fn late_timer_fires_once() {
        let start = Instant::now();
        let mut timers = IntervalTimers::new();
        let id = timers.set_interval(Duration::from_secs(1), start);

        assert_eq!(timers.due(start + Duration::from_secs(10)), vec![id]);
        assert!(timers.due(start + Duration::from_millis(10_500)).is_empty());
        assert_eq!(
            timers.next_deadline(),
            Some(start + Duration::from_secs(11))
        );
    }

    #[test]
    fn clear_is_idempotent() {
        let start = Instant::now();
        let mut timers = IntervalTimers::new();
        let id = timers.set_interval(Duration::from_secs(1), start);
        assert!(timers.clear_interval(id));
        assert!(!timers.clear_interval(id));
        assert_eq!(timers.active_count(), 0);
        assert!(timers.due(start + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn low_power_relaxes_period() {
        let mut policy = SamplingPolicy::default();
        assert_eq!(policy.period(), Duration::from_secs(1));
        policy.prefer_low_power = true;
        assert_eq!(policy.period(), Duration::from_secs(2));
    }
}
