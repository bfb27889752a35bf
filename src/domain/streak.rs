use super::AssetId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreakStatus {
    Active,
    Resolved,
    Escalated,
}

impl StreakStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreakStatus::Active => "ACTIVE",
            StreakStatus::Resolved => "RESOLVED",
            StreakStatus::Escalated => "ESCALATED",
        }
    }
}

/// Per `(asset, metric)` (§3, §4.F). Advanced once per daily cross-validator
/// pass; serialized per key so concurrent daily runs never race on the
/// counter (§5 "per-key serialization for streaks").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InconsistencyStreak {
    pub id: Option<i64>,
    pub asset_id: AssetId,
    pub metric_key: String,
    pub status: StreakStatus,
    pub first_occurrence: NaiveDate,
    pub last_occurrence: NaiveDate,
    pub consecutive_days: u32,
}

impl InconsistencyStreak {
    pub fn start(asset_id: AssetId, metric_key: String, business_date: NaiveDate) -> Self {
        Self {
            id: None,
            asset_id,
            metric_key,
            status: StreakStatus::Active,
            first_occurrence: business_date,
            last_occurrence: business_date,
            consecutive_days: 1,
        }
    }

    /// §4.F streak-advance rule applied to an INCONSISTENT observation on
    /// `business_date`: contiguous with `last_occurrence` increments the
    /// counter, otherwise the streak restarts at 1.
    pub fn advance(&mut self, business_date: NaiveDate) {
        if self.last_occurrence == business_date - chrono::Duration::days(1) {
            self.consecutive_days += 1;
        } else {
            self.consecutive_days = 1;
            self.first_occurrence = business_date;
        }
        self.last_occurrence = business_date;
        if self.status != StreakStatus::Escalated {
            self.status = StreakStatus::Active;
        }
    }

    pub fn resolve(&mut self) {
        self.status = StreakStatus::Resolved;
    }

    pub fn should_escalate(&self, escalation_days: u32) -> bool {
        self.status == StreakStatus::Active && self.consecutive_days >= escalation_days
    }

    pub fn escalate(&mut self) {
        self.status = StreakStatus::Escalated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn s5_streak_escalation_at_ten_consecutive_days() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut streak = InconsistencyStreak::start(1, "mass_hc_t".to_string(), start);
        for day in 1..10 {
            streak.advance(start + chrono::Duration::days(day));
        }
        assert_eq!(streak.consecutive_days, 10);
        assert!(streak.should_escalate(10));
    }

    #[test]
    fn escalated_streak_does_not_re_escalate_on_later_days() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut streak = InconsistencyStreak::start(1, "mass_hc_t".to_string(), start);
        for day in 1..10 {
            streak.advance(start + chrono::Duration::days(day));
        }
        assert!(streak.should_escalate(10));
        streak.escalate();

        for day in 10..15 {
            streak.advance(start + chrono::Duration::days(day));
            assert!(!streak.should_escalate(10), "day {day} must not re-escalate");
        }
        assert_eq!(streak.status, StreakStatus::Escalated);
        assert_eq!(streak.consecutive_days, 15);
    }

    #[test]
    fn gap_resets_streak() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut streak = InconsistencyStreak::start(1, "mass_hc_t".to_string(), start);
        streak.advance(start + chrono::Duration::days(5));
        assert_eq!(streak.consecutive_days, 1);
    }

    #[test]
    fn resolve_clears_active_status() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut streak = InconsistencyStreak::start(1, "mass_hc_t".to_string(), start);
        streak.resolve();
        assert!(!streak.should_escalate(1));
    }
}
