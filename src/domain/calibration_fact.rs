use super::AssetId;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CalibrationPhase {
    Oil,
    Gas,
    Water,
    Hc,
}

impl CalibrationPhase {
    pub const ALL: [CalibrationPhase; 4] = [
        CalibrationPhase::Oil,
        CalibrationPhase::Gas,
        CalibrationPhase::Water,
        CalibrationPhase::Hc,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            CalibrationPhase::Oil => "oil",
            CalibrationPhase::Gas => "gas",
            CalibrationPhase::Water => "water",
            CalibrationPhase::Hc => "hc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationStatus {
    Valid,
    Expired,
    Pending,
}

impl CalibrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationStatus::Valid => "VALID",
            CalibrationStatus::Expired => "EXPIRED",
            CalibrationStatus::Pending => "PENDING",
        }
    }
}

/// Acceptable range for a new K-factor (§3 invariant); outside this range
/// the factor is flagged `cal_factor_outlier_{phase}` and withheld.
pub const K_FACTOR_VALID_RANGE: std::ops::RangeInclusive<f64> = 0.5..=1.5;

/// A PVT/K-factor calibration record (§3), produced by the PDF parser's
/// `PVT_CALIBRATION` sub-shape. Not part of the 30-metric grain and never
/// reconciled against hourly/daily sums — consumed by the Canonicalizer's
/// K-factor flag logic (§4.D, invariants carried from §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFact {
    pub id: Option<i64>,
    pub asset_id: AssetId,
    pub asset_tag: String,
    pub calibration_no: String,
    pub selected_mpfm: Option<String>,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub status: CalibrationStatus,
    pub used_k_factor: BTreeMap<CalibrationPhase, f64>,
    pub new_k_factor: BTreeMap<CalibrationPhase, f64>,
    pub average_pressure_mpfm_kpa: Option<f64>,
    pub average_pressure_separator_kpa: Option<f64>,
    pub average_temperature_mpfm_c: Option<f64>,
    pub average_temperature_separator_c: Option<f64>,
    pub densities_mpfm_kg_m3: BTreeMap<CalibrationPhase, f64>,
    pub densities_separator_kg_m3: BTreeMap<CalibrationPhase, f64>,
    pub accumulated_mass_mpfm_t: BTreeMap<CalibrationPhase, f64>,
    pub accumulated_mass_separator_t: BTreeMap<CalibrationPhase, f64>,
    pub flags: Vec<String>,
}

impl CalibrationFact {
    pub fn natural_key(&self) -> (String, String) {
        (self.asset_tag.clone(), self.calibration_no.clone())
    }

    /// Applies the §3 K-factor discipline invariants to `new_k_factor` and
    /// returns the flags that should be attached: the new water factor is
    /// always withheld from propagation, and any new factor outside
    /// `[0.5, 1.5]` is flagged an outlier and withheld for that phase.
    pub fn compute_k_factor_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.new_k_factor.contains_key(&CalibrationPhase::Water) {
            flags.push("ignore_for_k_update".to_string());
        }
        for phase in CalibrationPhase::ALL {
            if let Some(value) = self.new_k_factor.get(&phase) {
                if !K_FACTOR_VALID_RANGE.contains(value) {
                    flags.push(format!("cal_factor_outlier_{}", phase.code()));
                }
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(new_k_factor: BTreeMap<CalibrationPhase, f64>) -> CalibrationFact {
        let ts = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        CalibrationFact {
            id: None,
            asset_id: 1,
            asset_tag: "13FT0367".to_string(),
            calibration_no: "CAL-001".to_string(),
            selected_mpfm: Some("MPFM-A".to_string()),
            window_start: ts,
            window_end: ts + chrono::Duration::hours(6),
            status: CalibrationStatus::Valid,
            used_k_factor: BTreeMap::new(),
            new_k_factor,
            average_pressure_mpfm_kpa: None,
            average_pressure_separator_kpa: None,
            average_temperature_mpfm_c: None,
            average_temperature_separator_c: None,
            densities_mpfm_kg_m3: BTreeMap::new(),
            densities_separator_kg_m3: BTreeMap::new(),
            accumulated_mass_mpfm_t: BTreeMap::new(),
            accumulated_mass_separator_t: BTreeMap::new(),
            flags: Vec::new(),
        }
    }

    #[test]
    fn s6_k_factor_flags() {
        let mut factors = BTreeMap::new();
        factors.insert(CalibrationPhase::Oil, 1.02);
        factors.insert(CalibrationPhase::Gas, 0.9);
        factors.insert(CalibrationPhase::Water, 1.7);
        factors.insert(CalibrationPhase::Hc, 1.6);
        let fact = sample(factors);
        let flags = fact.compute_k_factor_flags();
        assert!(flags.contains(&"ignore_for_k_update".to_string()));
        assert!(flags.contains(&"cal_factor_outlier_water".to_string()));
        assert!(flags.contains(&"cal_factor_outlier_hc".to_string()));
        assert!(!flags.contains(&"cal_factor_outlier_oil".to_string()));
        assert!(!flags.contains(&"cal_factor_outlier_gas".to_string()));
    }

    #[test]
    fn in_range_factors_yield_no_outlier_flags() {
        let mut factors = BTreeMap::new();
        factors.insert(CalibrationPhase::Oil, 1.0);
        let fact = sample(factors);
        assert!(fact.compute_k_factor_flags().is_empty());
    }
}
