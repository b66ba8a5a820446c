//! Monitored regions

use std::fmt;
use std::sync::Arc;

use super::config::{DisplayColor, TargetSpec, Thresholds, ValidatedConfig};
use super::transport::{HttpTransport, Transport, TransportError};

/// One monitored egress point. Immutable for the lifetime of the run.
#[derive(Clone)]
pub struct Target {
    name: String,
    thresholds: Thresholds,
    color: Option<DisplayColor>,
    transport: Arc<dyn Transport>,
}

impl Target {
    pub fn new(name: impl Into<String>, thresholds: Thresholds, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            thresholds,
            color: None,
            transport,
        }
    }

    pub fn from_spec(spec: &TargetSpec, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: spec.name.clone(),
            thresholds: spec.thresholds,
            color: spec.color,
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn color(&self) -> Option<DisplayColor> {
        self.color
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("thresholds", &self.thresholds)
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

/// Build one proxied HTTP client per configured region
pub fn build_http_targets(config: &ValidatedConfig) -> Result<Vec<Target>, TransportError> {
    config
        .targets
        .iter()
        .map(|spec| {
            let transport = HttpTransport::new(&spec.proxy, config.timeout)?;
            Ok(Target::from_spec(spec, Arc::new(transport)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtt_monitor::config::MonitorConfig;

    #[test]
    fn test_build_default_targets() {
        let config = MonitorConfig::default().validate().unwrap();
        let targets = build_http_targets(&config).unwrap();

        let names: Vec<_> = targets.iter().map(Target::name).collect();
        assert_eq!(names, ["HK", "JPN", "US West"]);
        assert_eq!(targets[0].thresholds().loss_ms(), 1000.0);
        assert!(targets[2].color().is_some());
    }
}
