//! Per-target cumulative statistics
//!
//! [`TargetStats`] holds the counters for one region; [`StatsAggregator`]
//! owns one lock-guarded slot per target so probes of different regions never
//! contend with each other.

use parking_lot::Mutex;

use super::sample::Sample;

/// Running counters for one target.
///
/// `received + loss_count == sent` after every [`TargetStats::apply`]; the
/// RTT aggregates only ever see received samples.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetStats {
    pub sent: u64,
    pub received: u64,
    pub loss_count: u64,
    pub rtt_sum: f64,
    pub rtt_min: f64,
    pub rtt_max: f64,
    pub last_sample: Option<Sample>,
}

impl Default for TargetStats {
    fn default() -> Self {
        Self {
            sent: 0,
            received: 0,
            loss_count: 0,
            rtt_sum: 0.0,
            rtt_min: f64::INFINITY,
            rtt_max: 0.0,
            last_sample: None,
        }
    }
}

impl TargetStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into the counters
    pub fn apply(&mut self, sample: &Sample) {
        self.sent += 1;
        match sample.latency_ms() {
            None => self.loss_count += 1,
            Some(ms) => {
                self.received += 1;
                self.rtt_sum += ms;
                self.rtt_min = self.rtt_min.min(ms);
                self.rtt_max = self.rtt_max.max(ms);
            }
        }
        self.last_sample = Some(sample.clone());
    }

    /// Lost share of sent probes, in percent
    pub fn loss_rate_percent(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        self.loss_count as f64 / self.sent as f64 * 100.0
    }

    /// Mean RTT over received samples
    pub fn mean_rtt_ms(&self) -> Option<f64> {
        if self.received == 0 {
            return None;
        }
        Some(self.rtt_sum / self.received as f64)
    }

    pub fn min_rtt_ms(&self) -> Option<f64> {
        (self.received > 0).then_some(self.rtt_min)
    }

    pub fn max_rtt_ms(&self) -> Option<f64> {
        (self.received > 0).then_some(self.rtt_max)
    }
}

/// Lock-per-target statistics registry
#[derive(Debug)]
pub struct StatsAggregator {
    slots: Vec<Mutex<TargetStats>>,
}

impl StatsAggregator {
    pub fn new(target_count: usize) -> Self {
        Self {
            slots: (0..target_count).map(|_| Mutex::new(TargetStats::new())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Apply a sample to one target's counters atomically.
    ///
    /// Panics if `target_index` is out of range.
    pub fn apply(&self, target_index: usize, sample: &Sample) {
        self.slots[target_index].lock().apply(sample);
    }

    /// Run `f` against a consistent view of one target's counters
    pub fn read<R>(&self, target_index: usize, f: impl FnOnce(&TargetStats) -> R) -> R {
        f(&self.slots[target_index].lock())
    }

    /// Copy of one target's counters
    pub fn get(&self, target_index: usize) -> TargetStats {
        self.read(target_index, TargetStats::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtt_monitor::config::Thresholds;
    use chrono::Utc;
    use std::sync::Arc;

    fn sample(latency: Option<f64>) -> Sample {
        let t = Thresholds::new(60.0, 100.0, 1000.0).unwrap();
        match latency {
            Some(ms) => Sample::measured(Utc::now(), ms, &t),
            None => Sample::lost(Utc::now()),
        }
    }

    #[test]
    fn test_initial_bounds() {
        let s = TargetStats::new();
        assert_eq!(s.rtt_min, f64::INFINITY);
        assert_eq!(s.rtt_max, 0.0);
        assert_eq!(s.mean_rtt_ms(), None);
        assert_eq!(s.min_rtt_ms(), None);
        assert_eq!(s.loss_rate_percent(), 0.0);
    }

    #[test]
    fn test_counters_balance() {
        let mut s = TargetStats::new();
        let pattern = [Some(42.0), None, Some(77.0), Some(130.0), None, Some(55.5), None];
        for latency in pattern.iter().cycle().take(100) {
            s.apply(&sample(*latency));
        }
        assert_eq!(s.sent, 100);
        assert_eq!(s.received + s.loss_count, 100);
        assert_eq!(s.loss_count, 43);
    }

    #[test]
    fn test_bounds_tighten_monotonically() {
        let mut s = TargetStats::new();
        let mut prev_min = f64::INFINITY;
        let mut prev_max = 0.0;

        for ms in [80.0, 65.0, 120.0, 90.0, 30.0, 300.0, 70.0] {
            s.apply(&sample(Some(ms)));
            assert!(s.rtt_min <= ms && ms <= s.rtt_max);
            assert!(s.rtt_min <= prev_min);
            assert!(s.rtt_max >= prev_max);
            prev_min = s.rtt_min;
            prev_max = s.rtt_max;
        }

        assert_eq!(s.min_rtt_ms(), Some(30.0));
        assert_eq!(s.max_rtt_ms(), Some(300.0));
    }

    #[test]
    fn test_loss_leaves_rtt_untouched() {
        let mut s = TargetStats::new();
        s.apply(&sample(Some(50.0)));
        s.apply(&sample(None));
        s.apply(&sample(Some(150.0)));

        assert_eq!(s.rtt_sum, 200.0);
        assert_eq!(s.mean_rtt_ms(), Some(100.0));
        assert!((s.loss_rate_percent() - 100.0 / 3.0).abs() < 1e-9);
        assert!(s.last_sample.as_ref().is_some_and(|l| l.latency_ms() == Some(150.0)));
    }

    #[test]
    fn test_aggregator_targets_are_independent() {
        let agg = StatsAggregator::new(2);
        agg.apply(0, &sample(Some(10.0)));
        agg.apply(0, &sample(None));
        agg.apply(1, &sample(Some(20.0)));

        assert_eq!(agg.get(0).sent, 2);
        assert_eq!(agg.get(1).sent, 1);
        assert_eq!(agg.read(1, |s| s.rtt_max), 20.0);
    }

    #[test]
    fn test_concurrent_apply_keeps_counters_consistent() {
        let agg = Arc::new(StatsAggregator::new(1));
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for n in 0..1000 {
                        let latency = if (n + i) % 3 == 0 { None } else { Some(50.0) };
                        agg.apply(0, &sample(latency));
                    }
                })
            })
            .collect();

        let reader = {
            let agg = agg.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    agg.read(0, |s| assert_eq!(s.received + s.loss_count, s.sent));
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(agg.get(0).sent, 4000);
    }
}
