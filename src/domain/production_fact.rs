use super::{metric_key, AssetId, Phase, PhaseBank, RawFileId};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportType {
    Hourly,
    Daily,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Hourly => "HOURLY",
            ReportType::Daily => "DAILY",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "HOURLY" => Some(ReportType::Hourly),
            "DAILY" => Some(ReportType::Daily),
            _ => None,
        }
    }

    /// The period length this report type must cover (§3 invariant).
    pub fn expected_duration(&self) -> chrono::Duration {
        match self {
            ReportType::Hourly => chrono::Duration::hours(1),
            ReportType::Daily => chrono::Duration::hours(24),
        }
    }
}

/// The canonical grain (§3). `metrics` holds the 30 (bank × phase) values
/// keyed by [`metric_key`]; a missing entry means "absent", never zero.
/// `densities` holds per-phase average density (kg/m³); `quality_flags`
/// records things like `ERR_UNIT` attached by the Canonicalizer (§4.D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionFact {
    pub id: Option<i64>,
    pub asset_id: AssetId,
    pub asset_tag: String,
    pub report_type: ReportType,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub business_date: NaiveDate,
    pub metrics: BTreeMap<String, f64>,
    pub average_pressure_kpa: Option<f64>,
    pub average_temperature_c: Option<f64>,
    pub bsw_pct: Option<f64>,
    pub densities_kg_m3: BTreeMap<String, f64>,
    pub quality_flags: Vec<String>,
    pub source_raw_file: RawFileId,
    /// Auxiliary per-period fields outside the 30-metric grain: `ctl`,
    /// `cpl`, `ctpl`, `meter_factor`, `totalizer_start`, `totalizer_end`.
    pub period_detail: BTreeMap<String, f64>,
}

impl ProductionFact {
    pub fn get_metric(&self, bank: PhaseBank, phase: Phase) -> Option<f64> {
        self.metrics.get(&metric_key(bank, phase)).copied()
    }

    pub fn set_metric(&mut self, bank: PhaseBank, phase: Phase, value: f64) {
        self.metrics.insert(metric_key(bank, phase), value);
    }

    /// §3 invariant: the HOURLY row covers exactly one 60-minute window and
    /// the DAILY row exactly one 24-hour window.
    pub fn period_matches_report_type(&self) -> bool {
        let span = self.period_end - self.period_start;
        span == self.report_type.expected_duration()
    }

    /// Natural key used for `INSERT OR REPLACE` idempotency (§4.D).
    pub fn natural_key(&self) -> (String, NaiveDateTime, ReportType) {
        (self.asset_tag.clone(), self.period_end, self.report_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(report_type: ReportType, hours: i64) -> ProductionFact {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        ProductionFact {
            id: None,
            asset_id: 1,
            asset_tag: "13FT0367".to_string(),
            report_type,
            period_start: start,
            period_end: start + chrono::Duration::hours(hours),
            business_date: start.date(),
            metrics: BTreeMap::new(),
            average_pressure_kpa: None,
            average_temperature_c: None,
            bsw_pct: None,
            densities_kg_m3: BTreeMap::new(),
            quality_flags: Vec::new(),
            source_raw_file: 1,
            period_detail: BTreeMap::new(),
        }
    }

    #[test]
    fn hourly_period_must_be_one_hour() {
        assert!(sample(ReportType::Hourly, 1).period_matches_report_type());
        assert!(!sample(ReportType::Hourly, 2).period_matches_report_type());
    }

    #[test]
    fn daily_period_must_be_24_hours() {
        assert!(sample(ReportType::Daily, 24).period_matches_report_type());
        assert!(!sample(ReportType::Daily, 23).period_matches_report_type());
    }

    #[test]
    fn metric_round_trip() {
        let mut fact = sample(ReportType::Daily, 24);
        fact.set_metric(PhaseBank::CorrectedMass, Phase::Oil, 100.0);
        assert_eq!(
            fact.get_metric(PhaseBank::CorrectedMass, Phase::Oil),
            Some(100.0)
        );
        assert_eq!(fact.get_metric(PhaseBank::CorrectedMass, Phase::Gas), None);
    }
}
