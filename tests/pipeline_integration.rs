//! End-to-end integration test over the library's public API.
//!
//! Mirrors the teacher's `backtest_run_integration.rs` style of exercising
//! the underlying components directly rather than spawning the compiled
//! binary, since the binary path isn't portable across a CI sandbox.

use chrono::NaiveDate;
use sgm_fm::config::Config;
use sgm_fm::domain::{Asset, AssetKind, Phase, PhaseBank, ProductionFact, ReportShape, ReportType};
use sgm_fm::store::Store;
use sgm_fm::{analyzer, reconciler, stager};

/// Resolves `asset_tag` and stages a throwaway fixture file so
/// `production_facts.source_raw_file` has a row to reference, then seeds
/// one daily fact and 24 matching hourly facts.
fn seed_day(store: &Store, asset_tag: &str, business_date: NaiveDate, daily_total: f64, hourly_each: f64) -> i64 {
    let (asset_id, _) = store
        .resolve_asset(&Asset::new(asset_tag, AssetKind::Mpfm))
        .unwrap();

    let fixture = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(fixture.path(), b"fixture").unwrap();
    let staged = stager::stage(store, fixture.path(), ReportShape::MpfmDaily, None, false).unwrap();
    let raw_file_id = staged.raw_file_id;

    let period_end = business_date.and_hms_opt(23, 59, 59).unwrap();
    let mut daily = ProductionFact {
        id: None,
        asset_id,
        asset_tag: asset_tag.to_string(),
        report_type: ReportType::Daily,
        period_start: business_date.and_hms_opt(0, 0, 0).unwrap(),
        period_end,
        business_date,
        metrics: Default::default(),
        average_pressure_kpa: None,
        average_temperature_c: None,
        bsw_pct: Some(12.0),
        densities_kg_m3: Default::default(),
        quality_flags: Vec::new(),
        source_raw_file: raw_file_id,
        period_detail: Default::default(),
    };
    daily.set_metric(PhaseBank::CorrectedMass, Phase::Oil, daily_total);
    store.upsert_production_fact(&daily).unwrap();

    for hour in 0..24 {
        let hour_end = business_date.and_hms_opt(hour, 59, 59).unwrap();
        let mut fact = daily.clone();
        fact.report_type = ReportType::Hourly;
        fact.period_end = hour_end;
        fact.period_start = business_date.and_hms_opt(hour, 0, 0).unwrap();
        fact.metrics.clear();
        fact.set_metric(PhaseBank::CorrectedMass, Phase::Oil, hourly_each);
        store.upsert_production_fact(&fact).unwrap();
    }

    asset_id
}

#[test]
fn reconciliation_pass_then_fail_across_two_days() {
    let store = Store::open_in_memory().unwrap();
    let cfg = Config::default();

    let day0 = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    let asset_id = seed_day(&store, "13FT0367", day0, 100.0, 99.8 / 24.0);
    let verdicts = reconciler::reconcile(&store, asset_id, day0, &cfg.reconciliation).unwrap();
    let overall = reconciler::overall_status(&verdicts).unwrap();
    assert_eq!(overall.as_str(), "PASS");

    let day1 = day0 + chrono::Duration::days(1);
    seed_day(&store, "13FT0367", day1, 100.0, 100.6 / 24.0);
    let verdicts = reconciler::reconcile(&store, asset_id, day1, &cfg.reconciliation).unwrap();
    let overall = reconciler::overall_status(&verdicts).unwrap();
    assert_eq!(overall.as_str(), "FAIL");
}

#[test]
fn bsw_alert_fires_through_analyze_day() {
    let store = Store::open_in_memory().unwrap();
    store
        .seed_operational_limit(&sgm_fm::domain::OperationalLimit {
            parameter: "BSW".to_string(),
            warning: 30.0,
            critical: 50.0,
            unit: "%".to_string(),
            description: String::new(),
            active: true,
        })
        .unwrap();

    let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    let alerts = analyzer::analyze_day(&store, 1, date, Some(62.0), None).unwrap();
    assert!(alerts.iter().any(|a| a.alert_type.as_str() == "BSW_HIGH" && a.severity.as_str() == "CRITICAL"));
}
