//! Maps parser records onto the canonical fact grain (§4.D): resolves/
//! upserts assets, harmonizes units, and applies `INSERT OR REPLACE`
//! semantics on the `ProductionFact` natural key.

use crate::domain::{
    Asset, AssetKind, CalibrationFact, CalibrationStatus, FlowComputerFact, Instrument,
    ProductionFact, ReportType,
};
use crate::error::CanonError;
use crate::parsers::{CalibrationRecord, FlowComputerRecord, ProductionRecord, ReportTypeHint};
use crate::store::Store;
use tracing::warn;

/// Converts `value` from `from_unit` to `to_unit`; returns `None` (and the
/// caller attaches `ERR_UNIT`) for any pair this table doesn't recognize.
fn convert_unit(value: f64, from_unit: &str, to_unit: &str) -> Option<f64> {
    if from_unit.eq_ignore_ascii_case(to_unit) {
        return Some(value);
    }
    match (from_unit.to_lowercase().as_str(), to_unit.to_lowercase().as_str()) {
        ("kg", "t") => Some(value / 1000.0),
        ("t", "kg") => Some(value * 1000.0),
        ("m3", "sm3") | ("m³", "sm3") => Some(value),
        ("kpa", "kpa") => Some(value),
        ("bar", "kpa") => Some(value * 100.0),
        ("f", "c") => Some((value - 32.0) * 5.0 / 9.0),
        _ => None,
    }
}

/// Resolves the asset by tag (first encounter seeds dimensions; later
/// mismatches warn and keep the earlier value, §4.D).
fn resolve_asset(
    store: &Store,
    asset_tag: &str,
    bank: Option<&str>,
    stream: Option<&str>,
) -> Result<i64, CanonError> {
    let mut candidate = Asset::new(asset_tag, AssetKind::Mpfm);
    candidate.bank = bank.map(|s| s.to_string());
    candidate.stream = stream.map(|s| s.to_string());
    let (id, warning) = store.resolve_asset(&candidate)?;
    if let Some(warning) = warning {
        warn!("{warning}");
    }
    Ok(id)
}

/// Turns one [`ProductionRecord`] into a [`ProductionFact`] and upserts it
/// idempotently under the natural key `(asset_tag, period_end,
/// report_type)` (§4.D).
pub fn canonicalize_production(
    store: &Store,
    record: &ProductionRecord,
    source_raw_file: i64,
) -> Result<ProductionFact, CanonError> {
    let asset_id = resolve_asset(
        store,
        &record.asset_tag,
        record.bank.as_deref(),
        record.stream.as_deref(),
    )?;

    let report_type = match record.report_type_hint {
        ReportTypeHint::Hourly => ReportType::Hourly,
        ReportTypeHint::Daily => ReportType::Daily,
    };
    let period_start = record
        .period_start
        .unwrap_or(record.period_end - report_type.expected_duration());

    let mut quality_flags = Vec::new();
    let mut metrics = std::collections::BTreeMap::new();
    for (&(bank, phase), &(value, unit)) in record.metrics.iter() {
        let key = crate::domain::metric_key(bank, phase);
        match convert_unit(value, unit, bank.unit()) {
            Some(converted) => {
                metrics.insert(key, converted);
            }
            None => {
                quality_flags.push("ERR_UNIT".to_string());
            }
        }
    }

    let average_pressure_kpa = record
        .average_pressure
        .and_then(|(v, u)| convert_unit(v, u, "kpa"));
    let average_temperature_c = record
        .average_temperature
        .and_then(|(v, u)| convert_unit(v, u, "c"));

    let densities_kg_m3 = record
        .densities
        .iter()
        .filter_map(|(phase, &(v, u))| convert_unit(v, u, "kg_m3").map(|c| (phase.code().to_string(), c)))
        .collect();

    let fact = ProductionFact {
        id: None,
        asset_id,
        asset_tag: record.asset_tag.clone(),
        report_type,
        period_start,
        period_end: record.period_end,
        business_date: record.period_end.date(),
        metrics,
        average_pressure_kpa,
        average_temperature_c,
        bsw_pct: record.bsw_pct,
        densities_kg_m3,
        quality_flags,
        source_raw_file,
        period_detail: record.period_detail.clone(),
    };

    store.upsert_production_fact(&fact)?;

    let time_window = fact.report_type.as_str().to_lowercase();
    let source_class = record.source_shape.source_class();
    for (key, value) in &fact.metrics {
        store.upsert_source_observation(
            fact.asset_id,
            fact.business_date,
            &time_window,
            key,
            source_class,
            *value,
        )?;
    }

    Ok(fact)
}

/// Maps a [`CalibrationRecord`] onto a [`CalibrationFact`], applying the
/// K-factor discipline invariants (§3, §8 property 8) before it is stored.
pub fn canonicalize_calibration(
    store: &Store,
    record: &CalibrationRecord,
    _source_raw_file: i64,
) -> Result<CalibrationFact, CanonError> {
    let asset_id = resolve_asset(store, &record.asset_tag, None, None)?;

    let mut fact = CalibrationFact {
        id: None,
        asset_id,
        asset_tag: record.asset_tag.clone(),
        calibration_no: record.calibration_no.clone(),
        selected_mpfm: record.selected_mpfm.clone(),
        window_start: record.window_start,
        window_end: record.window_end,
        status: CalibrationStatus::Valid,
        used_k_factor: record.used_k_factor.clone(),
        new_k_factor: record.new_k_factor.clone(),
        average_pressure_mpfm_kpa: record.average_pressure_mpfm,
        average_pressure_separator_kpa: record.average_pressure_separator,
        average_temperature_mpfm_c: record.average_temperature_mpfm,
        average_temperature_separator_c: record.average_temperature_separator,
        densities_mpfm_kg_m3: record.densities_mpfm.clone(),
        densities_separator_kg_m3: record.densities_separator.clone(),
        accumulated_mass_mpfm_t: record.accumulated_mass_mpfm.clone(),
        accumulated_mass_separator_t: record.accumulated_mass_separator.clone(),
        flags: Vec::new(),
    };
    fact.flags = fact.compute_k_factor_flags();

    store.upsert_calibration_fact(&fact)?;
    Ok(fact)
}

/// Maps a [`FlowComputerRecord`] onto a [`FlowComputerFact`] and upserts it
/// under the natural key `(asset_tag, collected_at)`. Asset-level
/// configuration, not part of the 30-metric grain (§4.B.3).
pub fn canonicalize_flow_computer(
    store: &Store,
    record: &FlowComputerRecord,
    _source_raw_file: i64,
) -> Result<FlowComputerFact, CanonError> {
    let asset_id = resolve_asset(store, &record.asset_tag, None, None)?;

    let to_instrument = |i: &crate::parsers::InstrumentRecord| Instrument {
        serial: i.serial.clone(),
        kind: i.kind.clone(),
        manufacturer: i.manufacturer.clone(),
        model: i.model.clone(),
        range: i.range.clone(),
        last_calibration: i.last_calibration,
        standard_uncertainty: i.standard_uncertainty,
    };

    let fact = FlowComputerFact {
        id: None,
        asset_id,
        asset_tag: record.asset_tag.clone(),
        serial: record.serial.clone(),
        collected_at: record.collected_at,
        ambient_temperature_c: record.ambient_temperature_c,
        ambient_pressure_kpa: record.ambient_pressure_kpa,
        reference_temperature_c: record.reference_temperature_c,
        reference_pressure_kpa: record.reference_pressure_kpa,
        software_version: record.software_version.clone(),
        meter_factors: record.meter_factors.clone(),
        pressure_instruments: record.pressure_instruments.iter().map(to_instrument).collect(),
        temperature_instruments: record.temperature_instruments.iter().map(to_instrument).collect(),
    };

    store.upsert_flow_computer_config(&fact)?;
    Ok(fact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Phase, PhaseBank};
    use chrono::NaiveDate;

    fn sample_record() -> ProductionRecord {
        let period_end = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        let mut metrics = std::collections::BTreeMap::new();
        metrics.insert((PhaseBank::CorrectedMass, Phase::Oil), (100.0, "t"));
        ProductionRecord {
            asset_tag: "13FT0367".to_string(),
            bank: None,
            stream: None,
            riser: None,
            report_type_hint: ReportTypeHint::Hourly,
            period_start: None,
            period_end,
            metrics,
            average_pressure: None,
            average_temperature: None,
            densities: std::collections::BTreeMap::new(),
            bsw_pct: None,
            source_shape: crate::domain::ReportShape::MpfmHourly,
            period_detail: std::collections::BTreeMap::new(),
        }
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let record = sample_record();
        let fact1 = canonicalize_production(&store, &record, 1).unwrap();
        let fact2 = canonicalize_production(&store, &record, 1).unwrap();
        assert_eq!(fact1.natural_key(), fact2.natural_key());
        let (daily, hourlies) = store
            .facts_for_business_date(fact1.asset_id, fact1.business_date)
            .unwrap();
        assert!(daily.is_none());
        assert_eq!(hourlies.len(), 1);
    }

    #[test]
    fn unconvertible_unit_flags_err_unit() {
        let store = Store::open_in_memory().unwrap();
        let mut record = sample_record();
        record.metrics.insert((PhaseBank::CorrectedMass, Phase::Gas), (5.0, "weird_unit"));
        let fact = canonicalize_production(&store, &record, 1).unwrap();
        assert!(fact.quality_flags.contains(&"ERR_UNIT".to_string()));
        assert_eq!(fact.get_metric(PhaseBank::CorrectedMass, Phase::Gas), None);
    }
}
