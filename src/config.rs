//! Process-wide configuration.
//!
//! Gathered once at startup and passed explicitly into every component
//! constructor (§4.I, §9 "Module-level configuration"); nothing below the
//! CLI boundary reads the environment or a config file directly.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Per-metric tolerance used by the cross-validator.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MetricTolerance {
    pub abs: f64,
    pub pct: f64,
}

/// Warning/critical thresholds used by the daily analyzer.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OperationalLimit {
    pub warning: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    pub absolute_mass_t: f64,
    pub absolute_volume_sm3: f64,
    pub relative_pct: f64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            absolute_mass_t: 0.5,
            absolute_volume_sm3: 1.0,
            relative_pct: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrossValidationConfig {
    #[serde(default = "default_tolerances")]
    pub tolerances: HashMap<String, MetricTolerance>,
    #[serde(default = "default_escalation_days")]
    pub escalation_days: u32,
}

fn default_escalation_days() -> u32 {
    10
}

fn default_tolerances() -> HashMap<String, MetricTolerance> {
    let mut m = HashMap::new();
    m.insert("mass".to_string(), MetricTolerance { abs: 0.0, pct: 0.5 });
    m.insert(
        "std_volume".to_string(),
        MetricTolerance { abs: 0.0, pct: 0.1 },
    );
    m.insert(
        "energy".to_string(),
        MetricTolerance { abs: 0.0, pct: 1.0 },
    );
    m.insert(
        "flow_time".to_string(),
        MetricTolerance { abs: 0.0, pct: 0.0 },
    );
    m
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            tolerances: default_tolerances(),
            escalation_days: default_escalation_days(),
        }
    }
}

fn default_operational_limits() -> HashMap<String, OperationalLimit> {
    let mut m = HashMap::new();
    m.insert(
        "BSW".to_string(),
        OperationalLimit {
            warning: 30.0,
            critical: 50.0,
        },
    );
    m.insert(
        "GAS_BALANCE".to_string(),
        OperationalLimit {
            warning: 1.0,
            critical: 2.0,
        },
    );
    m.insert(
        "PRODUCTION_VARIATION".to_string(),
        OperationalLimit {
            warning: 15.0,
            critical: 25.0,
        },
    );
    m
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_timeout")]
    pub parse_timeout_seconds: u64,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub cross_validation: CrossValidationConfig,
    #[serde(default = "default_operational_limits")]
    pub operational_limits: HashMap<String, OperationalLimit>,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_upload_folder")]
    pub upload_folder: PathBuf,
    #[serde(default = "default_export_folder")]
    pub export_folder: PathBuf,
    #[serde(default)]
    pub force_reparse: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_workers() -> usize {
    num_cpus::get()
}
fn default_timeout() -> u64 {
    300
}
fn default_database_path() -> PathBuf {
    PathBuf::from("sgm_fm.db")
}
fn default_upload_folder() -> PathBuf {
    PathBuf::from("uploads")
}
fn default_export_folder() -> PathBuf {
    PathBuf::from("exports")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            parse_timeout_seconds: default_timeout(),
            reconciliation: ReconciliationConfig::default(),
            cross_validation: CrossValidationConfig::default(),
            operational_limits: default_operational_limits(),
            database_path: default_database_path(),
            upload_folder: default_upload_folder(),
            export_folder: default_export_folder(),
            force_reparse: false,
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Config {
    /// Loads configuration from an optional TOML file, overlaying process
    /// defaults. Unlike a model that reads `env::var` inside deep components,
    /// this is the single place environment/file state enters the system.
    pub fn load(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let mut cfg = Config::default();
        if let Some(path) = path {
            if path.exists() {
                let text = std::fs::read_to_string(path)?;
                cfg = toml::from_str(&text)?;
            }
        }
        Ok(cfg)
    }

    pub fn parse_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.parse_timeout_seconds)
    }

    pub fn tolerance_for(&self, canonical_metric_class: &str) -> MetricTolerance {
        self.cross_validation
            .tolerances
            .get(canonical_metric_class)
            .copied()
            .unwrap_or(MetricTolerance { abs: 0.0, pct: 0.5 })
    }

    pub fn limit_for(&self, parameter: &str) -> OperationalLimit {
        self.operational_limits
            .get(parameter)
            .copied()
            .unwrap_or(OperationalLimit {
                warning: f64::INFINITY,
                critical: f64::INFINITY,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.reconciliation.absolute_mass_t, 0.5);
        assert_eq!(cfg.reconciliation.absolute_volume_sm3, 1.0);
        assert_eq!(cfg.reconciliation.relative_pct, 0.5);
        assert_eq!(cfg.cross_validation.escalation_days, 10);
        assert_eq!(cfg.limit_for("BSW").critical, 50.0);
    }

    #[test]
    fn load_without_file_is_defaults() {
        let cfg = Config::load(None).unwrap();
        assert_eq!(cfg.workers, num_cpus::get());
    }
}
