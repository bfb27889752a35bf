use super::AssetId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
    MissingDaily,
    MissingHourly,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Warn => "WARN",
            Verdict::Fail => "FAIL",
            Verdict::MissingDaily => "MISSING_DAILY",
            Verdict::MissingHourly => "MISSING_HOURLY",
        }
    }
}

/// One row per (asset, business_date, metric) (§4.E): the result of
/// comparing Σ(24 hourly) against the declared daily value under the
/// configured composite tolerance. Re-running the Reconciler for a date
/// deletes and reinserts every verdict for that (asset, date) pair —
/// there is no run history (§9 open question, resolved: no run_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationVerdict {
    pub id: Option<i64>,
    pub asset_id: AssetId,
    pub business_date: NaiveDate,
    pub metric_key: String,
    pub hourly_sum: Option<f64>,
    pub daily_value: Option<f64>,
    pub absolute_diff: Option<f64>,
    pub relative_diff_pct: Option<f64>,
    pub verdict: Verdict,
    pub hourly_count: u32,
}

impl ReconciliationVerdict {
    pub fn missing(
        asset_id: AssetId,
        business_date: NaiveDate,
        metric_key: String,
        verdict: Verdict,
        hourly_count: u32,
    ) -> Self {
        Self {
            id: None,
            asset_id,
            business_date,
            metric_key,
            hourly_sum: None,
            daily_value: None,
            absolute_diff: None,
            relative_diff_pct: None,
            verdict,
            hourly_count,
        }
    }
}
