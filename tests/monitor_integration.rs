//! Integration tests for the probe loop
//!
//! These drive the scheduler end to end with in-memory transports on a
//! paused tokio clock, so timing assertions are deterministic.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use tokio::time::Instant;

use region_rtt_monitor::rtt_monitor::{
    Classification, MonitorConfig, MonitorContext, Prober, Sample, Scheduler, Snapshot, Target,
    Thresholds, Transport, TransportError,
};

/// Replays a fixed list of (delay, outcome) steps, repeating the last one
struct ScriptedTransport {
    steps: Vec<(u64, Result<(), TransportError>)>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new(steps: Vec<(u64, Result<(), TransportError>)>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn round_trip(&self, _url: &Url) -> Result<(), TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay_ms, result) = self.steps[n.min(self.steps.len() - 1)].clone();
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        result
    }
}

fn thresholds() -> Thresholds {
    Thresholds::new(60.0, 100.0, 1000.0).unwrap()
}

fn prober() -> Prober {
    Prober::new(
        Url::parse("https://cp.example.com/generate_204/").unwrap(),
        Duration::from_millis(3500),
    )
}

fn scheduler_for(transports: &[Arc<ScriptedTransport>], interval_ms: u64) -> Scheduler {
    let targets = transports
        .iter()
        .enumerate()
        .map(|(i, t)| Target::new(format!("region-{}", i), thresholds(), t.clone()))
        .collect();
    let context = Arc::new(MonitorContext::new(targets, 5, Duration::from_secs(3600)));
    Scheduler::new(context, prober(), Duration::from_millis(interval_ms))
}

async fn run_cycles(scheduler: &Scheduler, cycles: u64) -> Vec<Snapshot> {
    let stop = scheduler.stop_handle();
    let mut snapshots = Vec::new();
    scheduler
        .run(&mut |snap: &Snapshot| {
            snapshots.push(snap.clone());
            if snap.cycle == cycles {
                stop.stop();
            }
        })
        .await;
    snapshots
}

#[tokio::test(start_paused = true)]
async fn test_failing_target_keeps_being_probed() {
    let healthy = ScriptedTransport::new(vec![(40, Ok(()))]);
    let flaky = ScriptedTransport::new(vec![
        (10, Err(TransportError::Connect("proxy refused".into()))),
        (80, Ok(())),
        (5, Err(TransportError::Protocol("reset".into()))),
        (150, Ok(())),
    ]);
    let scheduler = scheduler_for(&[healthy.clone(), flaky.clone()], 500);

    let snapshots = run_cycles(&scheduler, 4).await;

    assert_eq!(snapshots.len(), 4);
    assert_eq!(healthy.calls(), 4);
    assert_eq!(flaky.calls(), 4);

    let flaky_classes: Vec<_> = snapshots
        .iter()
        .map(|s| s.targets[1].last_classification)
        .collect();
    assert_eq!(
        flaky_classes,
        vec![
            Some(Classification::Loss),
            Some(Classification::Normal),
            Some(Classification::Loss),
            Some(Classification::Bad),
        ]
    );

    let last = snapshots[3].target("region-1").unwrap();
    assert_eq!(last.sent, 4);
    assert_eq!(last.loss_count, 2);
    assert_eq!(last.loss_rate_percent, 50.0);
    assert_eq!(snapshots[3].target("region-0").unwrap().loss_count, 0);
    assert!(snapshots[3].target("region-9").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_loss_without_stalling_cycle() {
    let hung = ScriptedTransport::new(vec![(60_000, Ok(()))]);
    let fast = ScriptedTransport::new(vec![(30, Ok(()))]);
    let scheduler = scheduler_for(&[hung, fast], 500);
    let start = Instant::now();

    let snapshots = run_cycles(&scheduler, 2).await;

    // Each cycle is capped by the 3.5s probe timeout
    assert!(start.elapsed() <= Duration::from_millis(7100));
    let hung_stats = &snapshots[1].targets[0];
    assert_eq!(hung_stats.sent, 2);
    assert_eq!(hung_stats.loss_count, 2);
    assert_eq!(snapshots[1].targets[1].last_classification, Some(Classification::Good));
}

#[tokio::test(start_paused = true)]
async fn test_ten_cycles_without_drift() {
    let slow = ScriptedTransport::new(vec![(400, Ok(()))]);
    let scheduler = scheduler_for(&[slow], 500);
    let start = Instant::now();

    let snapshots = run_cycles(&scheduler, 10).await;

    assert_eq!(snapshots.len(), 10);
    assert!(start.elapsed() <= Duration::from_millis(10 * 500));
    // 400ms is above the bad threshold but well inside the loss threshold
    assert_eq!(snapshots[9].targets[0].received, 10);
}

#[tokio::test(start_paused = true)]
async fn test_history_bounded_through_scheduler() {
    let t = ScriptedTransport::new(vec![(20, Ok(()))]);
    let scheduler = scheduler_for(&[t], 100);

    run_cycles(&scheduler, 8).await;

    let context = scheduler.context();
    assert_eq!(context.with_history(0, |h| h.recent.len()), 5);
    assert_eq!(context.with_history(0, |h| h.windowed.len()), 8);
    assert_eq!(context.stats(0).sent, 8);
}

#[test]
fn test_snapshot_never_torn_under_concurrent_record() {
    let transport = ScriptedTransport::new(vec![(0, Ok(()))]);
    let targets = vec![
        Target::new("a", thresholds(), transport.clone()),
        Target::new("b", thresholds(), transport),
    ];
    let context = Arc::new(MonitorContext::new(targets, 100, Duration::from_secs(3600)));

    let writers: Vec<_> = (0..2)
        .map(|index| {
            let context = context.clone();
            std::thread::spawn(move || {
                for n in 0..2000 {
                    let sample = if n % 4 == 0 {
                        Sample::lost(Utc::now())
                    } else {
                        Sample::measured(Utc::now(), 50.0 + n as f64 % 30.0, &thresholds())
                    };
                    context.record(index, sample);
                }
            })
        })
        .collect();

    for _ in 0..500 {
        for t in context.snapshot(0).targets {
            assert_eq!(t.received + t.loss_count, t.sent);
            if t.received > 0 {
                assert!(t.rtt_min_ms <= t.rtt_max_ms);
                assert!(t.mean_rtt_ms.is_some());
            }
        }
    }

    for w in writers {
        w.join().unwrap();
    }
    let final_snapshot = context.snapshot(0);
    assert!(final_snapshot.targets.iter().all(|t| t.sent == 2000 && t.loss_count == 500));
}

#[test]
fn test_load_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        url = "https://cp.example.com/generate_204/"
        timeout = 2000
        interval = 500
        recent_capacity = 100

        [[targets]]
        name = "HK"
        proxy = "socks5://127.0.0.1:60000"

        [[targets]]
        name = "US West"
        proxy = "socks5://127.0.0.1:60065"
        good_ms = 150.0
        bad_ms = 200.0
        loss_ms = 1500.0
        "#
    )
    .unwrap();

    let config = MonitorConfig::load(file.path()).unwrap().validate().unwrap();
    assert_eq!(config.timeout, Duration::from_millis(2000));
    assert_eq!(config.recent_capacity, 100);
    assert_eq!(config.targets[1].name, "US West");
    assert_eq!(config.targets[1].thresholds.loss_ms(), 1500.0);
}

#[test]
fn test_invalid_config_file_refuses_to_start() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [[targets]]
        name = "HK"
        proxy = "socks5://127.0.0.1:60000"
        good_ms = 120.0
        bad_ms = 100.0
        "#
    )
    .unwrap();

    let config = MonitorConfig::load(file.path()).unwrap();
    assert!(config.validate().is_err());
}
