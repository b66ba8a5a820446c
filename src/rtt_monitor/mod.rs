//! Region RTT Monitor
//!
//! Continuous round-trip latency measurement to one URL through several
//! proxied egress points, with live per-region quality statistics.
//!
//! Features:
//! - Fixed-cadence, drift-free probe cycles (one concurrent probe per region)
//! - Per-region Good/Normal/Bad/Loss classification against its own thresholds
//! - Running counters plus count-bounded and time-bounded sample history
//! - Lock-per-region state with consistent per-cycle snapshots
//! - Pluggable transport and renderer seams
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use region_rtt_monitor::rtt_monitor::{
//!     build_http_targets, MonitorConfig, MonitorContext, Prober, Scheduler, TerminalRenderer,
//! };
//!
//! let config = MonitorConfig::default().validate()?;
//! let targets = build_http_targets(&config)?;
//! let context = Arc::new(MonitorContext::new(targets, config.recent_capacity, config.history_window));
//! let prober = Prober::new(config.url.clone(), config.timeout);
//! let scheduler = Scheduler::new(context.clone(), prober, config.interval);
//!
//! let mut renderer = TerminalRenderer::stdout(context.targets());
//! scheduler.run(&mut renderer).await;
//! context.close_transports().await;
//! ```

pub mod config;
pub mod context;
pub mod history;
pub mod prober;
pub mod render;
pub mod sample;
pub mod scheduler;
pub mod snapshot;
pub mod stats;
pub mod target;
pub mod transport;

pub use config::*;
pub use context::*;
pub use history::*;
pub use prober::*;
pub use render::*;
pub use sample::*;
pub use scheduler::*;
pub use snapshot::*;
pub use stats::*;
pub use target::*;
pub use transport::*;
