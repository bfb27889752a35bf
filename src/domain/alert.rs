use super::AssetId;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertType {
    BswHigh,
    GasBalanceError,
    ProductionVariation,
    MissingData,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::BswHigh => "BSW_HIGH",
            AlertType::GasBalanceError => "GAS_BALANCE_ERROR",
            AlertType::ProductionVariation => "PRODUCTION_VARIATION",
            AlertType::MissingData => "MISSING_DATA",
        }
    }

    /// Operational-limits table key this alert type checks against (§6).
    pub fn limit_parameter(&self) -> &'static str {
        match self {
            AlertType::BswHigh => "BSW",
            AlertType::GasBalanceError => "GAS_BALANCE",
            AlertType::ProductionVariation => "PRODUCTION_VARIATION",
            AlertType::MissingData => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "INFO",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Critical => "CRITICAL",
        }
    }
}

/// Warning/critical thresholds for one named operational parameter (§3).
/// Redeclared here alongside `Alert` (the config module holds the
/// deserializable counterpart used to seed/override this table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationalLimit {
    pub parameter: String,
    pub warning: f64,
    pub critical: f64,
    pub unit: String,
    pub description: String,
    pub active: bool,
}

impl OperationalLimit {
    /// Classifies `value` against this limit; `None` if below warning.
    pub fn classify(&self, value: f64) -> Option<AlertSeverity> {
        if !self.active {
            return None;
        }
        if value >= self.critical {
            Some(AlertSeverity::Critical)
        } else if value >= self.warning {
            Some(AlertSeverity::Warning)
        } else {
            None
        }
    }
}

/// An advisory row produced by the daily analyzer (§3, §4.H). Append-only:
/// never mutated by later runs, and never feeds the reconciliation or
/// cross-validation write paths (§8 property 11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Option<i64>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub parameter: String,
    pub current_value: f64,
    pub limit_value: f64,
    pub unit: String,
    pub message: String,
    pub asset_id: Option<AssetId>,
    pub business_date: NaiveDate,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(warning: f64, critical: f64) -> OperationalLimit {
        OperationalLimit {
            parameter: "BSW".to_string(),
            warning,
            critical,
            unit: "%".to_string(),
            description: String::new(),
            active: true,
        }
    }

    #[test]
    fn s7_bsw_critical_classification() {
        let lim = limit(30.0, 50.0);
        assert_eq!(lim.classify(55.0), Some(AlertSeverity::Critical));
    }

    #[test]
    fn below_warning_yields_no_alert() {
        let lim = limit(30.0, 50.0);
        assert_eq!(lim.classify(10.0), None);
    }

    #[test]
    fn inactive_limit_never_alerts() {
        let mut lim = limit(0.0, 0.0);
        lim.active = false;
        assert_eq!(lim.classify(1000.0), None);
    }
}
