//! Region RTT Monitor Configuration
//!
//! Raw configuration is deserialized from TOML (or built from defaults) and
//! then validated once at startup into a [`ValidatedConfig`]. Nothing past
//! validation ever sees an unchecked threshold or an empty target list.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Default probe URL (returns an empty 204)
pub const DEFAULT_URL: &str = "https://cp.cloudflare.com/generate_204/";

/// Main configuration for the monitor, as read from disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// URL fetched by every probe
    #[serde(default = "default_url")]
    pub url: String,

    /// Overall per-probe timeout
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Fixed cycle cadence
    #[serde(default = "default_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Capacity of the per-target recent sample buffer
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,

    /// Age bound of the per-target windowed sample buffer
    #[serde(default = "default_history_window", with = "duration_serde")]
    pub history_window: Duration,

    /// Issue one unrecorded request per target before the first cycle
    #[serde(default = "default_warmup")]
    pub warmup: bool,

    /// Regions to monitor, in display order
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetConfig>,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_millis(3500)
}

fn default_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_recent_capacity() -> usize {
    5000
}

fn default_history_window() -> Duration {
    Duration::from_secs(3600)
}

fn default_warmup() -> bool {
    true
}

fn default_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig::local_socks("HK", 60000, "#ff4500"),
        TargetConfig::local_socks("JPN", 60048, "#1e90ff"),
        TargetConfig::local_socks("US West", 60065, "#32cd32"),
    ]
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout: default_timeout(),
            interval: default_interval(),
            recent_capacity: default_recent_capacity(),
            history_window: default_history_window(),
            warmup: default_warmup(),
            targets: default_targets(),
        }
    }
}

/// One monitored region, as read from disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Display name, unique within the run
    pub name: String,
    /// Proxy URL, e.g. `socks5://127.0.0.1:60000`
    pub proxy: String,
    /// Below this latency a sample is Good
    #[serde(default = "default_good_ms")]
    pub good_ms: f64,
    /// Above this latency a sample is Bad
    #[serde(default = "default_bad_ms")]
    pub bad_ms: f64,
    /// Above this latency a sample counts as lost
    #[serde(default = "default_loss_ms")]
    pub loss_ms: f64,
    /// Optional display color as `#rrggbb`
    #[serde(default)]
    pub color: Option<String>,
}

fn default_good_ms() -> f64 {
    60.0
}

fn default_bad_ms() -> f64 {
    100.0
}

fn default_loss_ms() -> f64 {
    1000.0
}

impl TargetConfig {
    /// SOCKS5 proxy on localhost with default thresholds
    pub fn local_socks(name: &str, port: u16, color: &str) -> Self {
        Self {
            name: name.into(),
            proxy: format!("socks5://127.0.0.1:{}", port),
            good_ms: default_good_ms(),
            bad_ms: default_bad_ms(),
            loss_ms: default_loss_ms(),
            color: Some(color.into()),
        }
    }
}

impl MonitorConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        Ok(config)
    }

    /// Parse from a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every invariant and produce the immutable runtime configuration
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let url = Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("timeout"));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroDuration("interval"));
        }
        if self.history_window.is_zero() {
            return Err(ConfigError::ZeroDuration("history_window"));
        }
        if self.recent_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let name = target.name.trim();
            if name.is_empty() {
                return Err(ConfigError::EmptyTargetName);
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::DuplicateTarget(name.to_string()));
            }
            targets.push(target.validate(name)?);
        }

        Ok(ValidatedConfig {
            url,
            timeout: self.timeout,
            interval: self.interval,
            recent_capacity: self.recent_capacity,
            history_window: self.history_window,
            warmup: self.warmup,
            targets,
        })
    }
}

impl TargetConfig {
    fn validate(&self, name: &str) -> Result<TargetSpec, ConfigError> {
        let thresholds = Thresholds::new(self.good_ms, self.bad_ms, self.loss_ms).map_err(
            |source| ConfigError::Thresholds {
                target: name.to_string(),
                source,
            },
        )?;

        let proxy = Url::parse(&self.proxy).map_err(|e| ConfigError::InvalidProxy {
            target: name.to_string(),
            proxy: self.proxy.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(proxy.scheme(), "http" | "https" | "socks5" | "socks5h") {
            return Err(ConfigError::InvalidProxy {
                target: name.to_string(),
                proxy: self.proxy.clone(),
                reason: format!("unsupported scheme '{}'", proxy.scheme()),
            });
        }

        let color = match &self.color {
            Some(hex) => Some(DisplayColor::parse_hex(hex).ok_or_else(|| {
                ConfigError::InvalidColor {
                    target: name.to_string(),
                    color: hex.clone(),
                }
            })?),
            None => None,
        };

        Ok(TargetSpec {
            name: name.to_string(),
            proxy,
            thresholds,
            color,
        })
    }
}

/// Runtime configuration; every field has passed validation
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub url: Url,
    pub timeout: Duration,
    pub interval: Duration,
    pub recent_capacity: usize,
    pub history_window: Duration,
    pub warmup: bool,
    pub targets: Vec<TargetSpec>,
}

/// Validated description of one region, before a transport is attached
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub name: String,
    pub proxy: Url,
    pub thresholds: Thresholds,
    pub color: Option<DisplayColor>,
}

/// Classification thresholds in milliseconds.
///
/// Always satisfies `0 < good <= bad < loss`; the only way to build one is
/// [`Thresholds::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    good_ms: f64,
    bad_ms: f64,
    loss_ms: f64,
}

impl Thresholds {
    pub fn new(good_ms: f64, bad_ms: f64, loss_ms: f64) -> Result<Self, ThresholdError> {
        if !(good_ms.is_finite() && bad_ms.is_finite() && loss_ms.is_finite()) {
            return Err(ThresholdError::NonFinite);
        }
        if good_ms <= 0.0 {
            return Err(ThresholdError::NonPositive(good_ms));
        }
        if good_ms > bad_ms {
            return Err(ThresholdError::GoodAboveBad { good_ms, bad_ms });
        }
        if bad_ms >= loss_ms {
            return Err(ThresholdError::BadNotBelowLoss { bad_ms, loss_ms });
        }
        Ok(Self {
            good_ms,
            bad_ms,
            loss_ms,
        })
    }

    pub fn good_ms(&self) -> f64 {
        self.good_ms
    }

    pub fn bad_ms(&self) -> f64 {
        self.bad_ms
    }

    pub fn loss_ms(&self) -> f64 {
        self.loss_ms
    }
}

/// 24-bit display color for a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl DisplayColor {
    /// Parse `#rrggbb` (leading `#` optional)
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

/// Why a threshold triple was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdError {
    NonFinite,
    NonPositive(f64),
    GoodAboveBad { good_ms: f64, bad_ms: f64 },
    BadNotBelowLoss { bad_ms: f64, loss_ms: f64 },
}

impl fmt::Display for ThresholdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite => write!(f, "thresholds must be finite"),
            Self::NonPositive(good) => write!(f, "good threshold must be positive (got {})", good),
            Self::GoodAboveBad { good_ms, bad_ms } => {
                write!(f, "good threshold {}ms exceeds bad threshold {}ms", good_ms, bad_ms)
            }
            Self::BadNotBelowLoss { bad_ms, loss_ms } => write!(
                f,
                "bad threshold {}ms must be below loss threshold {}ms",
                bad_ms, loss_ms
            ),
        }
    }
}

impl std::error::Error for ThresholdError {}

/// Fatal startup configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    InvalidUrl { url: String, reason: String },
    ZeroDuration(&'static str),
    ZeroCapacity,
    NoTargets,
    EmptyTargetName,
    DuplicateTarget(String),
    Thresholds { target: String, source: ThresholdError },
    InvalidProxy { target: String, proxy: String, reason: String },
    InvalidColor { target: String, color: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "invalid config file: {}", e),
            Self::InvalidUrl { url, reason } => write!(f, "invalid target url '{}': {}", url, reason),
            Self::ZeroDuration(field) => write!(f, "{} must be greater than zero", field),
            Self::ZeroCapacity => write!(f, "recent_capacity must be greater than zero"),
            Self::NoTargets => write!(f, "at least one target must be configured"),
            Self::EmptyTargetName => write!(f, "target name must not be empty"),
            Self::DuplicateTarget(name) => write!(f, "duplicate target name '{}'", name),
            Self::Thresholds { target, source } => write!(f, "target '{}': {}", target, source),
            Self::InvalidProxy {
                target,
                proxy,
                reason,
            } => write!(f, "target '{}': invalid proxy '{}': {}", target, proxy, reason),
            Self::InvalidColor { target, color } => {
                write!(f, "target '{}': invalid color '{}' (expected #rrggbb)", target, color)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Thresholds { source, .. } => Some(source),
            _ => None,
        }
    }
}

// Serde helper for Duration (using milliseconds for simplicity)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
