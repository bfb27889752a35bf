//! Daily analyzer / alerting (§4.H, grounded in `daily_analyzer.py`).
//!
//! Runs independently of the Reconciler/Cross-validator; opens its own
//! read transaction over already-committed facts and never writes to
//! their tables (§9 "daily analyzer as a pure read-side consumer").

use crate::domain::{Alert, AlertSeverity, AlertType, AssetId, Phase, PhaseBank};
use crate::error::AnalyzerError;
use crate::parsers::{GasBalanceRow, GasBalanceSign};
use crate::store::Store;
use chrono::{NaiveDate, Utc};

fn limit_alert(
    store: &Store,
    alert_type: AlertType,
    current_value: f64,
    unit: &str,
    asset_id: Option<AssetId>,
    business_date: NaiveDate,
    message: String,
) -> Result<Option<Alert>, AnalyzerError> {
    let parameter = alert_type.limit_parameter();
    let Some(limit) = store.get_operational_limit(parameter)? else {
        return Ok(None);
    };
    let Some(severity) = limit.classify(current_value) else {
        return Ok(None);
    };
    let limit_value = match severity {
        AlertSeverity::Critical => limit.critical,
        _ => limit.warning,
    };
    Ok(Some(Alert {
        id: None,
        alert_type,
        severity,
        parameter: parameter.to_string(),
        current_value,
        limit_value,
        unit: unit.to_string(),
        message,
        asset_id,
        business_date,
        created_at: Utc::now().naive_utc(),
    }))
}

/// §4.H BSW check: any canonicalized BSW-percentage measurement at or
/// above the `BSW` warning/critical limit emits `BSW_HIGH`.
pub fn check_bsw(
    store: &Store,
    asset_id: AssetId,
    business_date: NaiveDate,
    bsw_pct: f64,
) -> Result<Option<Alert>, AnalyzerError> {
    limit_alert(
        store,
        AlertType::BswHigh,
        bsw_pct,
        "%",
        Some(asset_id),
        business_date,
        format!("BSW {bsw_pct:.1}% on asset {asset_id}"),
    )
}

/// §4.H gas-balance check: `calculado = Σ(+) − Σ(−)`; `declarado` is the
/// `TOTAL` row value (falls back to `calculado` if absent).
pub fn check_gas_balance(
    store: &Store,
    business_date: NaiveDate,
    rows: &[GasBalanceRow],
) -> Result<Option<Alert>, AnalyzerError> {
    let positives: f64 = rows
        .iter()
        .filter(|r| r.sign == GasBalanceSign::Positive)
        .filter_map(|r| r.flowrate)
        .sum();
    let negatives: f64 = rows
        .iter()
        .filter(|r| r.sign == GasBalanceSign::Negative)
        .filter_map(|r| r.flowrate)
        .sum();
    let calculado = positives - negatives;
    let declarado = rows
        .iter()
        .find(|r| r.sign == GasBalanceSign::Total)
        .and_then(|r| r.flowrate)
        .unwrap_or(calculado);

    let diferenca_pct = if calculado.abs() > 1e-9 {
        (calculado - declarado).abs() / calculado.abs() * 100.0
    } else {
        0.0
    };

    limit_alert(
        store,
        AlertType::GasBalanceError,
        diferenca_pct,
        "%",
        None,
        business_date,
        format!(
            "gas balance deviation {diferenca_pct:.1}% (calculado={calculado:.2}, declarado={declarado:.2})"
        ),
    )
}

/// §4.H production-variation check: compares a DAILY volume metric against
/// the same metric on `business_date - 1`.
pub fn check_production_variation(
    store: &Store,
    asset_id: AssetId,
    business_date: NaiveDate,
) -> Result<Vec<Alert>, AnalyzerError> {
    let (today, _) = store.facts_for_business_date(asset_id, business_date)?;
    let (yesterday, _) = store.facts_for_business_date(asset_id, business_date - chrono::Duration::days(1))?;

    let (Some(today), Some(yesterday)) = (today, yesterday) else {
        return Ok(Vec::new());
    };

    let mut alerts = Vec::new();
    for (bank, phase) in [
        (PhaseBank::PvtRefVolSc, Phase::Total),
        (PhaseBank::PvtRefVol20c, Phase::Total),
    ] {
        let (Some(current), Some(previous)) = (
            today.get_metric(bank, phase),
            yesterday.get_metric(bank, phase),
        ) else {
            continue;
        };
        if previous <= 0.0 {
            continue;
        }
        let variation_pct = (current - previous).abs() / previous * 100.0;
        if let Some(alert) = limit_alert(
            store,
            AlertType::ProductionVariation,
            variation_pct,
            "%",
            Some(asset_id),
            business_date,
            format!(
                "{bank}/{phase} day-over-day variation {variation_pct:.1}% (prev={previous:.2}, current={current:.2})",
                bank = bank.code(),
                phase = phase.code()
            ),
        )? {
            alerts.push(alert);
        }
    }
    Ok(alerts)
}

/// §4.H missing-data check: any active asset with zero `ProductionFact`
/// rows on the date emits `MISSING_DATA`/`WARNING`.
pub fn check_missing_data(
    store: &Store,
    asset_id: AssetId,
    business_date: NaiveDate,
) -> Result<Option<Alert>, AnalyzerError> {
    let (daily, hourlies) = store.facts_for_business_date(asset_id, business_date)?;
    if daily.is_some() || !hourlies.is_empty() {
        return Ok(None);
    }
    Ok(Some(Alert {
        id: None,
        alert_type: AlertType::MissingData,
        severity: AlertSeverity::Warning,
        parameter: String::new(),
        current_value: 0.0,
        limit_value: 0.0,
        unit: String::new(),
        message: format!("no production facts for asset {asset_id} on {business_date}"),
        asset_id: Some(asset_id),
        business_date,
        created_at: Utc::now().naive_utc(),
    }))
}

/// Runs every check for one `(asset, business_date)` pair, persisting
/// (append-only) whatever alerts fire. `gas_balance_rows` is optional
/// per-date input since not every date has a gas-balance sheet.
pub fn analyze_day(
    store: &Store,
    asset_id: AssetId,
    business_date: NaiveDate,
    bsw_pct: Option<f64>,
    gas_balance_rows: Option<&[GasBalanceRow]>,
) -> Result<Vec<Alert>, AnalyzerError> {
    let mut alerts = Vec::new();

    if let Some(bsw) = bsw_pct {
        if let Some(alert) = check_bsw(store, asset_id, business_date, bsw)? {
            alerts.push(alert);
        }
    }
    if let Some(rows) = gas_balance_rows {
        if let Some(alert) = check_gas_balance(store, business_date, rows)? {
            alerts.push(alert);
        }
    }
    alerts.extend(check_production_variation(store, asset_id, business_date)?);
    if let Some(alert) = check_missing_data(store, asset_id, business_date)? {
        alerts.push(alert);
    }

    for alert in &alerts {
        store.insert_alert(alert)?;
    }
    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationalLimit;

    fn store_with_defaults() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .seed_operational_limit(&OperationalLimit {
                parameter: "BSW".to_string(),
                warning: 30.0,
                critical: 50.0,
                unit: "%".to_string(),
                description: String::new(),
                active: true,
            })
            .unwrap();
        store
            .seed_operational_limit(&OperationalLimit {
                parameter: "GAS_BALANCE".to_string(),
                warning: 1.0,
                critical: 2.0,
                unit: "%".to_string(),
                description: String::new(),
                active: true,
            })
            .unwrap();
        store
            .seed_operational_limit(&OperationalLimit {
                parameter: "PRODUCTION_VARIATION".to_string(),
                warning: 15.0,
                critical: 25.0,
                unit: "%".to_string(),
                description: String::new(),
                active: true,
            })
            .unwrap();
        store
    }

    #[test]
    fn s7_bsw_alert() {
        let store = store_with_defaults();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let alert = check_bsw(&store, 1, date, 55.0).unwrap().unwrap();
        assert_eq!(alert.severity.as_str(), "CRITICAL");
        assert_eq!(alert.limit_value, 50.0);
    }

    #[test]
    fn s8_gas_balance_alert() {
        let store = store_with_defaults();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let rows = vec![
            GasBalanceRow {
                order: 1,
                sign: GasBalanceSign::Positive,
                description: "entradas".to_string(),
                flowrate: Some(1000.0),
                pd: None,
            },
            GasBalanceRow {
                order: 2,
                sign: GasBalanceSign::Negative,
                description: "saidas".to_string(),
                flowrate: Some(980.0),
                pd: None,
            },
            GasBalanceRow {
                order: 3,
                sign: GasBalanceSign::Total,
                description: "TOTAL".to_string(),
                flowrate: Some(15.0),
                pd: None,
            },
        ];
        let alert = check_gas_balance(&store, date, &rows).unwrap().unwrap();
        assert_eq!(alert.severity.as_str(), "CRITICAL");
        assert!((alert.current_value - 25.0).abs() < 1e-6);
    }

    #[test]
    fn s9_production_variation_warning_boundary() {
        let store = store_with_defaults();
        let day0 = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let day1 = day0 + chrono::Duration::days(1);

        let mut prev = crate::domain::ProductionFact {
            id: None,
            asset_id: 1,
            asset_tag: "13FT0367".to_string(),
            report_type: crate::domain::ReportType::Daily,
            period_start: day0.and_hms_opt(0, 0, 0).unwrap(),
            period_end: day0.and_hms_opt(23, 59, 59).unwrap(),
            business_date: day0,
            metrics: Default::default(),
            average_pressure_kpa: None,
            average_temperature_c: None,
            bsw_pct: None,
            densities_kg_m3: Default::default(),
            quality_flags: Vec::new(),
            source_raw_file: 1,
            period_detail: Default::default(),
        };
        prev.set_metric(PhaseBank::PvtRefVolSc, Phase::Total, 1000.0);
        store.upsert_production_fact(&prev).unwrap();

        let mut current = prev.clone();
        current.business_date = day1;
        current.period_start = day1.and_hms_opt(0, 0, 0).unwrap();
        current.period_end = day1.and_hms_opt(23, 59, 59).unwrap();
        current.set_metric(PhaseBank::PvtRefVolSc, Phase::Total, 850.0);
        store.upsert_production_fact(&current).unwrap();

        let alerts = check_production_variation(&store, 1, day1).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity.as_str(), "WARNING");
    }

    #[test]
    fn missing_data_when_no_facts() {
        let store = store_with_defaults();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let alert = check_missing_data(&store, 1, date).unwrap().unwrap();
        assert_eq!(alert.alert_type.as_str(), "MISSING_DATA");
    }
}
