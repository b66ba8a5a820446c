//! Read-only views handed to renderers

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::sample::Classification;
use super::stats::TargetStats;

/// Display fields for one target, derived from its counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSnapshot {
    pub name: String,
    pub sent: u64,
    pub received: u64,
    pub loss_count: u64,
    pub loss_rate_percent: f64,
    pub mean_rtt_ms: Option<f64>,
    pub rtt_min_ms: Option<f64>,
    pub rtt_max_ms: Option<f64>,
    pub last_classification: Option<Classification>,
    pub last_latency_ms: Option<f64>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl TargetSnapshot {
    pub fn from_stats(name: &str, stats: &TargetStats) -> Self {
        let last = stats.last_sample.as_ref();
        Self {
            name: name.to_string(),
            sent: stats.sent,
            received: stats.received,
            loss_count: stats.loss_count,
            loss_rate_percent: stats.loss_rate_percent(),
            mean_rtt_ms: stats.mean_rtt_ms(),
            rtt_min_ms: stats.min_rtt_ms(),
            rtt_max_ms: stats.max_rtt_ms(),
            last_classification: last.map(|s| s.classification()),
            last_latency_ms: last.and_then(|s| s.latency_ms()),
            last_timestamp: last.map(|s| s.timestamp()),
        }
    }
}

/// Point-in-time view of every target, in configuration order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Completed cycles at the time of the snapshot
    pub cycle: u64,
    pub taken_at: DateTime<Utc>,
    pub targets: Vec<TargetSnapshot>,
}

impl Snapshot {
    pub fn target(&self, name: &str) -> Option<&TargetSnapshot> {
        self.targets.iter().find(|t| t.name == name)
    }
}
