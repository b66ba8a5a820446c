//! Monitor context
//!
//! The single owned object holding every target together with its
//! statistics and history. Built once at startup and shared by `Arc` with
//! the scheduler and its probe tasks; all mutation goes through
//! [`MonitorContext::record`].

use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use super::history::{HistoryBuffers, HistoryStore};
use super::sample::Sample;
use super::snapshot::{Snapshot, TargetSnapshot};
use super::stats::{StatsAggregator, TargetStats};
use super::target::Target;

pub struct MonitorContext {
    targets: Vec<Target>,
    stats: StatsAggregator,
    history: HistoryStore,
}

impl MonitorContext {
    pub fn new(targets: Vec<Target>, recent_capacity: usize, history_window: Duration) -> Self {
        let count = targets.len();
        Self {
            targets,
            stats: StatsAggregator::new(count),
            history: HistoryStore::new(count, recent_capacity, history_window),
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, index: usize) -> Option<&Target> {
        self.targets.get(index)
    }

    /// Apply a completed sample to the target's stats and history
    pub fn record(&self, index: usize, sample: Sample) {
        self.stats.apply(index, &sample);
        self.history.append(index, sample);
    }

    pub fn stats(&self, index: usize) -> TargetStats {
        self.stats.get(index)
    }

    /// Run `f` against one target's history buffers
    pub fn with_history<R>(&self, index: usize, f: impl FnOnce(&HistoryBuffers) -> R) -> R {
        self.history.read(index, f)
    }

    /// Consistent view of every target. Each target's fields come from one
    /// acquisition of its stats lock.
    pub fn snapshot(&self, cycle: u64) -> Snapshot {
        let targets = self
            .targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                self.stats
                    .read(i, |stats| TargetSnapshot::from_stats(target.name(), stats))
            })
            .collect();

        Snapshot {
            cycle,
            taken_at: Utc::now(),
            targets,
        }
    }

    /// Close every transport. Errors are logged and otherwise ignored so
    /// shutdown always completes.
    pub async fn close_transports(&self) {
        for target in &self.targets {
            if let Err(e) = target.transport().close().await {
                warn!("Failed to close transport for {}: {}", target.name(), e);
            }
        }
    }
}
