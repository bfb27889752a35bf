//! Compares same-metric values across source shapes and maintains the
//! per-(asset, metric) inconsistency streak, escalating to a
//! [`NonConformance`] past the configured threshold (§4.F).
//!
//! Streak updates are serialized per `(asset, metric)` key with a
//! `DashMap<(AssetId, String), Mutex<()>>`-style lock (§5, §9) so
//! concurrent daily runs never race the counter.

use crate::config::CrossValidationConfig;
use crate::domain::{
    AssetId, CrossVerdict, CrossVerdictClass, InconsistencyStreak, NonConformance, SourceValues,
};
use crate::error::CrossValidateError;
use crate::store::Store;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;

type StreakKey = (AssetId, String);

static STREAK_LOCKS: Lazy<DashMap<StreakKey, Arc<Mutex<()>>>> = Lazy::new(DashMap::new);

fn lock_for(key: &StreakKey) -> Arc<Mutex<()>> {
    STREAK_LOCKS
        .entry(key.clone())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Classifies a group of observed values per §4.F: computes the spread
/// against `reference_value * tolerance_pct + tolerance_abs`-style bound
/// (see [`CrossVerdict::classify`]) and tags the outcome.
pub fn classify(
    asset_id: AssetId,
    business_date: NaiveDate,
    time_window: &str,
    metric_key: &str,
    values: SourceValues,
    config: &CrossValidationConfig,
    tolerance_class: &str,
) -> CrossVerdict {
    let tolerance = config
        .tolerances
        .get(tolerance_class)
        .copied()
        .unwrap_or(crate::config::MetricTolerance { abs: 0.0, pct: 0.5 });
    let mut verdict = CrossVerdict::classify(&values, tolerance.abs, tolerance.pct);
    verdict.asset_id = asset_id;
    verdict.business_date = business_date;
    verdict.time_window = time_window.to_string();
    verdict.metric_key = metric_key.to_string();
    verdict
}

/// Applies the §4.F streak-advance rule for one classified group and
/// escalates to a [`NonConformance`] when the threshold is crossed. Locked
/// per `(asset, metric)` so concurrent callers serialize (§5, §9).
pub fn update_streak(
    store: &Store,
    asset_id: AssetId,
    metric_key: &str,
    business_date: NaiveDate,
    classification: CrossVerdictClass,
    escalation_days: u32,
) -> Result<(), CrossValidateError> {
    if !classification.participates_in_streak() {
        return Ok(());
    }

    let key: StreakKey = (asset_id, metric_key.to_string());
    let lock = lock_for(&key);
    let _guard = lock.lock();

    let existing = store.get_streak(asset_id, metric_key)?;

    match classification {
        CrossVerdictClass::Inconsistent => {
            let mut streak = existing.unwrap_or_else(|| {
                InconsistencyStreak::start(asset_id, metric_key.to_string(), business_date)
            });
            if streak.last_occurrence != business_date {
                streak.advance(business_date);
            }
            store.upsert_streak(&streak)?;

            if streak.should_escalate(escalation_days) {
                let nc = NonConformance {
                    id: None,
                    event_id: NonConformance::event_id_for(
                        &asset_id.to_string(),
                        metric_key,
                        business_date,
                    ),
                    asset_id,
                    metric_key: metric_key.to_string(),
                    occurrence_date: business_date,
                    detected_at: Utc::now().naive_utc(),
                    deviation_description: format!(
                        "{consecutive_days}-day inconsistency streak for metric {metric_key}",
                        consecutive_days = streak.consecutive_days
                    ),
                    partial_deadline: None,
                    final_deadline: None,
                };
                store.insert_non_conformance_if_absent(&nc)?;
                let mut escalated = streak;
                escalated.escalate();
                store.upsert_streak(&escalated)?;
            }
        }
        CrossVerdictClass::Consistent | CrossVerdictClass::Acceptable => {
            if let Some(mut streak) = existing {
                streak.resolve();
                store.upsert_streak(&streak)?;
            }
        }
        CrossVerdictClass::SingleSource | CrossVerdictClass::NoData => unreachable!(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceValues;

    #[test]
    fn s4_classification_matches_scenario() {
        let values = SourceValues {
            spreadsheet: Some(500.0),
            xml: Some(500.5),
            pdf: Some(500.4),
            txt: None,
        };
        let cfg = CrossValidationConfig::default();
        let verdict = classify(
            1,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            "daily",
            "corrected_mass_hc",
            values,
            &cfg,
            "mass",
        );
        assert_eq!(verdict.classification.as_str(), "ACCEPTABLE");
    }

    #[test]
    fn s5_streak_escalates_after_ten_consecutive_inconsistent_days() {
        let store = Store::open_in_memory().unwrap();
        let start = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        for day in 0..10 {
            let date = start + chrono::Duration::days(day);
            update_streak(&store, 1, "mass_hc_t", date, CrossVerdictClass::Inconsistent, 10).unwrap();
        }
        let streak = store.get_streak(1, "mass_hc_t").unwrap().unwrap();
        assert_eq!(streak.consecutive_days, 10);
        assert_eq!(streak.status.as_str(), "ESCALATED");
    }

    #[test]
    fn escalation_fires_exactly_once_past_the_threshold() {
        let store = Store::open_in_memory().unwrap();
        let start = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        for day in 0..20 {
            let date = start + chrono::Duration::days(day);
            update_streak(&store, 1, "mass_hc_t", date, CrossVerdictClass::Inconsistent, 10).unwrap();
        }
        let streak = store.get_streak(1, "mass_hc_t").unwrap().unwrap();
        assert_eq!(streak.consecutive_days, 20);
        assert_eq!(streak.status.as_str(), "ESCALATED");
        assert_eq!(store.count_non_conformances_for(1, "mass_hc_t").unwrap(), 1);
    }

    #[test]
    fn single_source_and_no_data_never_touch_streak() {
        let store = Store::open_in_memory().unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        update_streak(&store, 1, "m", date, CrossVerdictClass::SingleSource, 10).unwrap();
        update_streak(&store, 1, "m", date, CrossVerdictClass::NoData, 10).unwrap();
        assert!(store.get_streak(1, "m").unwrap().is_none());
    }
}
