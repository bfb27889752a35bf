use super::AssetId;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Opened when an [`InconsistencyStreak`](super::InconsistencyStreak)
/// crosses the escalation threshold (§3, §4.F). `event_id` is the
/// deterministic key `NC-CV-{asset}-{metric}-{date}` so re-running the
/// cross-validator over the same escalating day is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonConformance {
    pub id: Option<i64>,
    pub event_id: String,
    pub asset_id: AssetId,
    pub metric_key: String,
    pub occurrence_date: NaiveDate,
    pub detected_at: NaiveDateTime,
    pub deviation_description: String,
    pub partial_deadline: Option<NaiveDate>,
    pub final_deadline: Option<NaiveDate>,
}

impl NonConformance {
    pub fn event_id_for(asset_tag: &str, metric_key: &str, occurrence_date: NaiveDate) -> String {
        format!("NC-CV-{}-{}-{}", asset_tag, metric_key, occurrence_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_event_id_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let id = NonConformance::event_id_for("A", "mass_hc_t", date);
        assert_eq!(id, "NC-CV-A-mass_hc_t-2026-01-10");
        assert_eq!(id, NonConformance::event_id_for("A", "mass_hc_t", date));
    }
}
