//! Probe samples and latency classification

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::Thresholds;

/// Quality bucket of a single sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Good,
    Normal,
    Bad,
    Loss,
}

impl Classification {
    /// Pure function of latency and thresholds. Strict comparisons on both
    /// ends, so a latency equal to either threshold is Normal.
    pub fn of(latency_ms: Option<f64>, thresholds: &Thresholds) -> Self {
        match latency_ms {
            None => Self::Loss,
            Some(ms) if ms < thresholds.good_ms() => Self::Good,
            Some(ms) if ms > thresholds.bad_ms() => Self::Bad,
            Some(_) => Self::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Normal => "normal",
            Self::Bad => "bad",
            Self::Loss => "loss",
        }
    }
}

/// Outcome of one probe. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    timestamp: DateTime<Utc>,
    latency_ms: Option<f64>,
    classification: Classification,
}

impl Sample {
    /// Build from a measured round trip. Anything slower than the loss
    /// threshold is recorded as a loss.
    pub fn measured(timestamp: DateTime<Utc>, elapsed_ms: f64, thresholds: &Thresholds) -> Self {
        let latency_ms = (elapsed_ms <= thresholds.loss_ms()).then_some(elapsed_ms);
        Self {
            timestamp,
            latency_ms,
            classification: Classification::of(latency_ms, thresholds),
        }
    }

    /// Build a loss sample (transport failure or timeout)
    pub fn lost(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            latency_ms: None,
            classification: Classification::Loss,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn is_loss(&self) -> bool {
        self.latency_ms.is_none()
    }
}
