//! Verifies Σ(24 hourly) against the daily value per metric and emits a
//! [`ReconciliationVerdict`] row per metric (§4.E).

use crate::config::ReconciliationConfig;
use crate::domain::{all_metric_keys, AssetId, PhaseBank, ReconciliationVerdict, Verdict};
use crate::error::ReconcileError;
use crate::store::Store;
use chrono::NaiveDate;

/// Applies the §4.E verdict rule to one metric's (sum_hourly, daily) pair.
fn verdict_for_metric(
    hourly_sum: Option<f64>,
    hourly_count: u32,
    daily_value: Option<f64>,
    tolerance_abs: f64,
    tolerance_pct: f64,
) -> (Verdict, Option<f64>, Option<f64>) {
    match (daily_value, hourly_sum) {
        (None, _) if hourly_count == 0 => (Verdict::MissingDaily, None, None),
        (None, _) => (Verdict::MissingDaily, None, None),
        (Some(_), None) => (Verdict::MissingHourly, None, None),
        (Some(daily), Some(sum)) => {
            if hourly_count == 0 {
                return (Verdict::MissingHourly, None, None);
            }
            let abs_diff = (daily - sum).abs();
            let pct_diff = if daily.abs() > 1e-6 {
                abs_diff / daily.abs()
            } else if abs_diff > tolerance_abs {
                1.0
            } else {
                0.0
            };
            let verdict = if abs_diff <= tolerance_abs && pct_diff <= tolerance_pct / 100.0 {
                Verdict::Pass
            } else if abs_diff <= 2.0 * tolerance_abs {
                Verdict::Warn
            } else {
                Verdict::Fail
            };
            (verdict, Some(abs_diff), Some(pct_diff * 100.0))
        }
    }
}

/// Reconciles one `(asset, business_date)` pair across all 30 canonical
/// metrics, replacing any prior verdicts for that key (§4.E).
pub fn reconcile(
    store: &Store,
    asset_id: AssetId,
    business_date: NaiveDate,
    config: &ReconciliationConfig,
) -> Result<Vec<ReconciliationVerdict>, ReconcileError> {
    let (daily, hourlies) = store.facts_for_business_date(asset_id, business_date)?;
    let hourly_count = hourlies.len() as u32;

    let mut verdicts = Vec::with_capacity(all_metric_keys().len());
    for (bank, phase, key) in all_metric_keys() {
        let daily_value = daily.as_ref().and_then(|f| f.get_metric(bank, phase));
        let hourly_values: Vec<f64> = hourlies
            .iter()
            .filter_map(|f| f.get_metric(bank, phase))
            .collect();

        if daily_value.is_none() && hourly_values.is_empty() {
            continue;
        }

        let hourly_sum = if hourly_values.is_empty() {
            None
        } else {
            Some(hourly_values.iter().sum())
        };

        let tolerance_abs = match bank {
            PhaseBank::UncorrectedMass | PhaseBank::CorrectedMass | PhaseBank::PvtRefMassSc | PhaseBank::PvtRefMass20c => {
                config.absolute_mass_t
            }
            PhaseBank::PvtRefVolSc | PhaseBank::PvtRefVol20c => config.absolute_volume_sm3,
        };

        let (verdict, absolute_diff, relative_diff_pct) = verdict_for_metric(
            hourly_sum,
            hourly_count,
            daily_value,
            tolerance_abs,
            config.relative_pct,
        );

        verdicts.push(ReconciliationVerdict {
            id: None,
            asset_id,
            business_date,
            metric_key: key,
            hourly_sum,
            daily_value,
            absolute_diff,
            relative_diff_pct,
            verdict,
            hourly_count,
        });
    }

    store.replace_reconciliation_verdicts(asset_id, business_date, &verdicts)?;
    Ok(verdicts)
}

/// The worst verdict across a day's metrics: `FAIL > WARN > PASS >
/// MISSING_*` (§4.E).
pub fn overall_status(verdicts: &[ReconciliationVerdict]) -> Option<Verdict> {
    fn rank(v: Verdict) -> u8 {
        match v {
            Verdict::Fail => 3,
            Verdict::Warn => 2,
            Verdict::Pass => 1,
            Verdict::MissingDaily | Verdict::MissingHourly => 0,
        }
    }
    verdicts.iter().map(|v| v.verdict).max_by_key(|v| rank(*v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_reconciliation_pass() {
        let cfg = ReconciliationConfig::default();
        let (verdict, abs, pct) = verdict_for_metric(Some(99.8), 24, Some(100.0), cfg.absolute_mass_t, cfg.relative_pct);
        assert_eq!(verdict, Verdict::Pass);
        assert!((abs.unwrap() - 0.2).abs() < 1e-9);
        assert!(pct.unwrap() <= 0.5);
    }

    #[test]
    fn s2_reconciliation_fail() {
        let cfg = ReconciliationConfig::default();
        let (verdict, _, _) = verdict_for_metric(Some(100.6), 24, Some(100.0), cfg.absolute_mass_t, cfg.relative_pct);
        assert_eq!(verdict, Verdict::Fail);
    }

    #[test]
    fn s3_missing_hourly() {
        let cfg = ReconciliationConfig::default();
        let (verdict, _, _) = verdict_for_metric(None, 0, Some(100.0), cfg.absolute_mass_t, cfg.relative_pct);
        assert_eq!(verdict, Verdict::MissingHourly);
    }

    #[test]
    fn missing_daily_when_daily_absent() {
        let cfg = ReconciliationConfig::default();
        let (verdict, _, _) = verdict_for_metric(Some(50.0), 24, None, cfg.absolute_mass_t, cfg.relative_pct);
        assert_eq!(verdict, Verdict::MissingDaily);
    }

    #[test]
    fn overall_status_picks_worst() {
        let base = ReconciliationVerdict::missing(1, chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), "x".to_string(), Verdict::Pass, 24);
        let mut fail = base.clone();
        fail.verdict = Verdict::Fail;
        let verdicts = vec![base, fail];
        assert_eq!(overall_status(&verdicts), Some(Verdict::Fail));
    }

    fn rank(v: Verdict) -> u8 {
        match v {
            Verdict::Fail => 3,
            Verdict::Warn => 2,
            Verdict::Pass => 1,
            Verdict::MissingDaily | Verdict::MissingHourly => 0,
        }
    }

    proptest::proptest! {
        /// §8 property 4: widening the gap between the hourly sum and the
        /// daily value never improves the verdict.
        #[test]
        fn verdict_rank_is_monotonic_in_absolute_diff(
            daily in 1000.0f64..10_000.0,
            small_diff in 0.0f64..0.4,
            extra in 0.0f64..5.0,
        ) {
            let cfg = ReconciliationConfig::default();
            let (closer, _, _) = verdict_for_metric(Some(daily - small_diff), 24, Some(daily), cfg.absolute_mass_t, cfg.relative_pct);
            let (farther, _, _) = verdict_for_metric(Some(daily - small_diff - extra), 24, Some(daily), cfg.absolute_mass_t, cfg.relative_pct);
            proptest::prop_assert!(rank(farther) >= rank(closer));
        }
    }
}
