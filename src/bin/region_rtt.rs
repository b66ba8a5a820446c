//! Region RTT Monitor
//!
//! Live round-trip latency dashboard for several proxied regions.
//!
//! Usage:
//!   region-rtt --config regions.toml --interval-ms 500
//!
//! Environment Variables:
//!   RTT_MONITOR_CONFIG - Path to TOML config file
//!   RUST_LOG - Log filter (overrides --log-level)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures_util::future::join_all;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use region_rtt_monitor::rtt_monitor::{
    build_http_targets, JsonLinesRenderer, MonitorConfig, MonitorContext, Prober, Renderer,
    Scheduler, StopHandle, TerminalRenderer, ValidatedConfig,
};

#[derive(Parser, Debug)]
#[command(name = "region-rtt")]
#[command(about = "Real round-trip latency through multiple proxied regions")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "RTT_MONITOR_CONFIG")]
    config: Option<String>,

    /// Probe URL (overrides config)
    #[arg(long)]
    url: Option<String>,

    /// Cycle interval in milliseconds (overrides config)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Per-probe timeout in milliseconds (overrides config)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Skip the warmup request before the first cycle
    #[arg(long)]
    no_warmup: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Output::Terminal)]
    output: Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    /// In-place status lines
    Terminal,
    /// One JSON snapshot per line
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never tear the live view on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = load_config(&args)?;
    let interactive = args.output == Output::Terminal;

    let targets = build_http_targets(&config).context("Failed to build proxy clients")?;
    let context = Arc::new(MonitorContext::new(
        targets,
        config.recent_capacity,
        config.history_window,
    ));
    let prober = Prober::new(config.url.clone(), config.timeout);

    // Listen for signals before warmup so an early Ctrl+C still shuts down cleanly
    let scheduler = Scheduler::new(context.clone(), prober.clone(), config.interval);
    let stop = scheduler.stop_handle();
    tokio::spawn(stop_on_signal(stop.clone()));

    if interactive {
        println!("=== Multi-region real RTT monitor ===");
        println!("Target URL : {}", prober.url());
        println!(
            "Regions    : {}",
            context
                .targets()
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!();
    }

    if config.warmup {
        tokio::select! {
            _ = warm_up(&context, &prober, interactive) => {}
            _ = stop.stopped() => info!("Stopped during warmup"),
        }
    }

    if interactive && !stop.is_stopped() {
        println!("Live test running (Ctrl+C to stop)\n");
    }

    let mut renderer: Box<dyn Renderer> = match args.output {
        Output::Terminal => Box::new(TerminalRenderer::stdout(context.targets())),
        Output::Json => Box::new(JsonLinesRenderer::new(std::io::stdout())),
    };
    let summary = scheduler.run(renderer.as_mut()).await;

    context.close_transports().await;
    info!("Completed {} cycles", summary.cycles);
    if interactive {
        println!("\nStopped, exiting...");
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<ValidatedConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path);
            MonitorConfig::load(path).with_context(|| format!("Failed to load config {}", path))?
        }
        None => {
            info!("Using default configuration");
            MonitorConfig::default()
        }
    };

    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if let Some(ms) = args.interval_ms {
        config.interval = Duration::from_millis(ms);
    }
    if let Some(ms) = args.timeout_ms {
        config.timeout = Duration::from_millis(ms);
    }
    if args.no_warmup {
        config.warmup = false;
    }

    let validated = config.validate().context("Invalid configuration")?;
    for target in &validated.targets {
        info!(
            "  - {} via {} (good<{}ms bad>{}ms loss>{}ms)",
            target.name,
            target.proxy,
            target.thresholds.good_ms(),
            target.thresholds.bad_ms(),
            target.thresholds.loss_ms()
        );
    }
    Ok(validated)
}

/// Open each region's connection once before measuring; results are shown
/// but never recorded
async fn warm_up(context: &MonitorContext, prober: &Prober, interactive: bool) {
    if interactive {
        println!("Warming up connections...");
    }

    let results = join_all(context.targets().iter().map(|t| prober.warm_up(t))).await;
    for (target, result) in context.targets().iter().zip(results) {
        match result {
            Ok(warmup) => {
                let protocol = warmup
                    .version
                    .map_or_else(|| "unknown".to_string(), |v| format!("{:?}", v));
                info!(
                    "{} warmup ok in {}ms over {}",
                    target.name(),
                    warmup.elapsed.as_millis(),
                    protocol
                );
                if interactive {
                    println!(
                        "{} warmup ok ({}ms, protocol {})",
                        target.name(),
                        warmup.elapsed.as_millis(),
                        protocol
                    );
                }
            }
            Err(e) => {
                warn!("{} warmup failed: {}", target.name(), e);
                if interactive {
                    println!("{} warmup failed: {}", target.name(), e);
                }
            }
        }
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
}

async fn stop_on_signal(stop: StopHandle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    stop.stop();
}
