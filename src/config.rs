// src/config.rs

use crate::analysis::DetectorConfig;
use crate::matching::MatcherConfig;
use crate::simulation::SimulatorConfig;
use crate::zones::ZoneConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub zones: ZoneConfig,
    pub matcher: MatcherConfig,
    pub simulator: SimulatorConfig,
    pub callouts: CalloutConfig,
    pub logging: LoggingConfig,
}

/// When the binary announces the next curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalloutConfig {
    /// Curves whose entry is within this distance ahead are announced (m).
    pub lookahead_m: f64,
    /// Curves below this severity are not announced.
    pub min_severity: u8,
}

impl Default for CalloutConfig {
    fn default() -> Self {
        Self {
            lookahead_m: 800.0,
            min_severity: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "road_cues=info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
zones:
  weights:
    urban: 25.0
matcher:
  max_off_route_m: 80.0
callouts:
  min_severity: 3
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.zones.weights.urban, 25.0);
        assert_eq!(cfg.zones.weights.cluster, ZoneConfig::default().weights.cluster);
        assert_eq!(cfg.matcher.max_off_route_m, 80.0);
        assert_eq!(cfg.matcher.backward_tolerance_m, 50.0);
        assert_eq!(cfg.detector.resample_interval_m, 8.0);
        assert_eq!(cfg.logging.level, "road_cues=info");
        assert_eq!(cfg.callouts.min_severity, 3);
        assert_eq!(cfg.callouts.lookahead_m, 800.0);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let cfg = Config::from_yaml("{}").unwrap();
        assert_eq!(cfg.simulator.transit_mph, SimulatorConfig::default().transit_mph);
    }

    #[test]
    fn test_shipped_config_parses() {
        let cfg = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.yaml")).unwrap();
        assert_eq!(cfg.detector.character.straight_change_deg, 2.0);
        assert_eq!(cfg.detector.thresholds.technical.speed_factor, 0.92);
        assert_eq!(cfg.simulator.playback_rate, 20.0);
        assert_eq!(cfg.simulator.technical_mph, 40.0);
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let err = Config::load("/nonexistent/road_cues.yaml").unwrap_err();
        assert!(format!("{:#}", err).contains("reading config"));
    }
}
