//! Active Probing Implementation
//!
//! Times one round trip through a target's transport and turns the outcome
//! into a classified [`Sample`]. Failures never escape [`Prober::probe`]: a
//! connect error, protocol error or timeout is a measurement outcome (loss),
//! not a reason to stop probing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Url, Version};
use tokio::time::{timeout, Instant};
use tracing::debug;

use super::sample::Sample;
use super::target::Target;
use super::transport::TransportError;

/// Why a single measurement produced no latency
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeFailure {
    /// Overall timeout expired before the response was drained
    Timeout(Duration),
    /// Transport reported an error
    Transport(TransportError),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(d) => write!(f, "no response within {}ms", d.as_millis()),
            Self::Transport(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProbeFailure {}

/// Result of an unrecorded warmup request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Warmup {
    pub elapsed: Duration,
    /// Negotiated protocol, when the transport reports one
    pub version: Option<Version>,
}

/// Latency prober shared by all probe tasks
#[derive(Debug, Clone)]
pub struct Prober {
    url: Arc<Url>,
    timeout: Duration,
}

impl Prober {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            url: Arc::new(url),
            timeout,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// One timed round trip. Elapsed time covers the request and the full
    /// drain of the response body.
    pub async fn measure(&self, target: &Target) -> Result<Duration, ProbeFailure> {
        let start = Instant::now();

        match timeout(self.timeout, target.transport().round_trip(&self.url)).await {
            Ok(Ok(())) => Ok(start.elapsed()),
            Ok(Err(e)) => Err(ProbeFailure::Transport(e)),
            Err(_) => Err(ProbeFailure::Timeout(self.timeout)),
        }
    }

    /// Probe a target and classify the result against its thresholds
    pub async fn probe(&self, target: &Target) -> Sample {
        let outcome = self.measure(target).await;
        let completed_at = Utc::now();

        match outcome {
            Ok(elapsed) => {
                let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
                Sample::measured(completed_at, elapsed_ms, target.thresholds())
            }
            Err(failure) => {
                debug!("Probe via {} failed: {}", target.name(), failure);
                Sample::lost(completed_at)
            }
        }
    }

    /// Unrecorded request that opens the pooled connection ahead of the
    /// first cycle
    pub async fn warm_up(&self, target: &Target) -> Result<Warmup, ProbeFailure> {
        let start = Instant::now();

        match timeout(self.timeout, target.transport().warm_up(&self.url)).await {
            Ok(Ok(version)) => Ok(Warmup {
                elapsed: start.elapsed(),
                version,
            }),
            Ok(Err(e)) => Err(ProbeFailure::Transport(e)),
            Err(_) => Err(ProbeFailure::Timeout(self.timeout)),
        }
    }
}
