//! Fixed-cadence probe scheduler
//!
//! Each cycle moves through three phases:
//! - Idle: wait for the next tick (or a stop request)
//! - Dispatch: spawn one probe task per target
//! - Settle: join every task, then snapshot and render
//!
//! Ticks sit on absolute deadlines (`previous start + interval`), so time
//! spent probing is absorbed instead of added. A cycle that overruns the
//! interval is followed immediately by the next one and the grid restarts
//! from there, without trying to catch up on missed ticks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::context::MonitorContext;
use super::prober::Prober;
use super::render::Renderer;
use super::sample::Sample;

/// Stops a running [`Scheduler`] at its next Idle phase
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`StopHandle::stop`] has been called, immediately if it
    /// already was
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// Totals reported when the loop exits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
}

pub struct Scheduler {
    context: Arc<MonitorContext>,
    prober: Prober,
    interval: Duration,
    stop_tx: Arc<watch::Sender<bool>>,
}

impl Scheduler {
    pub fn new(context: Arc<MonitorContext>, prober: Prober, interval: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            context,
            prober,
            interval,
            stop_tx: Arc::new(stop_tx),
        }
    }

    pub fn context(&self) -> &Arc<MonitorContext> {
        &self.context
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop_tx.clone(),
        }
    }

    /// Drive cycles until stopped. The renderer is called exactly once per
    /// completed cycle, after every sample of that cycle has been applied.
    pub async fn run<R: Renderer + ?Sized>(&self, renderer: &mut R) -> RunSummary {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stop_rx = self.stop_tx.subscribe();
        let mut cycles = 0u64;

        info!(
            "Starting probe loop: {} targets every {}ms",
            self.context.targets().len(),
            self.interval.as_millis()
        );

        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;
                _ = stop_rx.wait_for(|stopped| *stopped) => break,
                _ = ticker.tick() => {}
            }

            self.run_cycle().await;
            cycles += 1;

            let snapshot = self.context.snapshot(cycles);
            renderer.render(&snapshot);
        }

        info!("Probe loop stopped after {} cycles", cycles);
        RunSummary { cycles }
    }

    /// Probe every target once, concurrently, and wait for all results to
    /// be recorded
    pub async fn run_cycle(&self) {
        let started = Instant::now();

        let tasks = (0..self.context.targets().len()).map(|index| {
            let context = self.context.clone();
            let prober = self.prober.clone();
            tokio::spawn(async move {
                let sample = prober.probe(&context.targets()[index]).await;
                context.record(index, sample);
            })
        });

        for (index, result) in join_all(tasks).await.into_iter().enumerate() {
            if let Err(e) = result {
                // Keep one sample per target per cycle even if a task died
                let name = self.context.target(index).map_or("?", |t| t.name());
                warn!("Probe task for {} failed: {}", name, e);
                self.context.record(index, Sample::lost(Utc::now()));
            }
        }

        let elapsed = started.elapsed();
        if elapsed > self.interval {
            debug!(
                "Cycle overran interval: {}ms > {}ms",
                elapsed.as_millis(),
                self.interval.as_millis()
            );
        }
    }
}
