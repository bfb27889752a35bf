use super::{AssetId, BatchId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityFlag {
    BatchIncomplete,
    MissingDaily,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityFlag::BatchIncomplete => "batch_incomplete",
            QualityFlag::MissingDaily => "missing_daily",
        }
    }
}

/// One per (batch, asset, business-date) (§3). Created at staging time and
/// never mutated by parsers afterwards — only the Stager's manifest
/// bookkeeping step writes to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub batch_id: BatchId,
    pub asset_id: AssetId,
    pub business_date: NaiveDate,
    pub expected_hourly: u32,
    pub found_hourly: u32,
    pub has_daily: bool,
    pub has_calibration: bool,
    pub quality_flags: Vec<QualityFlag>,
}

impl Manifest {
    pub fn new(batch_id: BatchId, asset_id: AssetId, business_date: NaiveDate) -> Self {
        Self {
            batch_id,
            asset_id,
            business_date,
            expected_hourly: 24,
            found_hourly: 0,
            has_daily: false,
            has_calibration: false,
            quality_flags: Vec::new(),
        }
    }

    /// Recomputes the derived quality flags from the current counters.
    pub fn recompute_flags(&mut self) {
        self.quality_flags.clear();
        if self.found_hourly < self.expected_hourly {
            self.quality_flags.push(QualityFlag::BatchIncomplete);
        }
        if !self.has_daily {
            self.quality_flags.push(QualityFlag::MissingDaily);
        }
    }
}
