//! The canonical fact model (§3).
//!
//! One file per entity, the way the teacher lays out `backtest_v2/`: small,
//! independently testable structs with the business rules attached as
//! methods rather than scattered through the pipeline stages.

mod alert;
mod asset;
mod batch;
mod calibration_fact;
mod cross_verdict;
mod flow_computer_fact;
mod manifest;
mod metric;
mod non_conformance;
mod production_fact;
mod raw_file;
mod reconciliation_verdict;
mod streak;

pub use alert::{Alert, AlertSeverity, AlertType, OperationalLimit};
pub use asset::{Asset, AssetId, AssetKind};
pub use batch::{Batch, BatchId, BatchStatus};
pub use calibration_fact::{CalibrationFact, CalibrationPhase, CalibrationStatus};
pub use cross_verdict::{CrossVerdict, CrossVerdictClass, SourceClass, SourceValues};
pub use flow_computer_fact::{FlowComputerFact, Instrument};
pub use manifest::{Manifest, QualityFlag};
pub use metric::{all_metric_keys, metric_key, Phase, PhaseBank};
pub use non_conformance::NonConformance;
pub use production_fact::{ProductionFact, ReportType};
pub use raw_file::{ParseStatus, RawFile, RawFileId};
pub use reconciliation_verdict::{ReconciliationVerdict, Verdict};
pub use streak::{InconsistencyStreak, StreakStatus};

use serde::{Deserialize, Serialize};

/// Shape assigned by the classifier (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportShape {
    SpreadsheetDailyOil,
    SpreadsheetDailyGas,
    SpreadsheetDailyWater,
    SpreadsheetGasBalance,
    MpfmHourly,
    MpfmDaily,
    MpfmPvtCalibration,
    Xml001,
    Xml002,
    Xml003,
    Xml004,
    BatchArchive,
    Unknown,
}

impl ReportShape {
    pub fn is_spreadsheet(&self) -> bool {
        matches!(
            self,
            ReportShape::SpreadsheetDailyOil
                | ReportShape::SpreadsheetDailyGas
                | ReportShape::SpreadsheetDailyWater
                | ReportShape::SpreadsheetGasBalance
        )
    }

    pub fn is_xml(&self) -> bool {
        matches!(
            self,
            ReportShape::Xml001 | ReportShape::Xml002 | ReportShape::Xml003 | ReportShape::Xml004
        )
    }

    pub fn is_pdf(&self) -> bool {
        matches!(
            self,
            ReportShape::MpfmHourly | ReportShape::MpfmDaily | ReportShape::MpfmPvtCalibration
        )
    }

    /// Coarse source class used by the cross-validator to group values by
    /// upstream shape family rather than exact sub-shape (§3 CrossVerdict).
    pub fn source_class(&self) -> SourceClass {
        if self.is_spreadsheet() {
            SourceClass::Spreadsheet
        } else if self.is_xml() {
            SourceClass::Xml
        } else if self.is_pdf() {
            SourceClass::Pdf
        } else {
            SourceClass::Txt
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportShape::SpreadsheetDailyOil => "SPREADSHEET_DAILY_OIL",
            ReportShape::SpreadsheetDailyGas => "SPREADSHEET_DAILY_GAS",
            ReportShape::SpreadsheetDailyWater => "SPREADSHEET_DAILY_WATER",
            ReportShape::SpreadsheetGasBalance => "SPREADSHEET_GAS_BALANCE",
            ReportShape::MpfmHourly => "MPFM_HOURLY",
            ReportShape::MpfmDaily => "MPFM_DAILY",
            ReportShape::MpfmPvtCalibration => "MPFM_PVT_CALIBRATION",
            ReportShape::Xml001 => "XML_001",
            ReportShape::Xml002 => "XML_002",
            ReportShape::Xml003 => "XML_003",
            ReportShape::Xml004 => "XML_004",
            ReportShape::BatchArchive => "BATCH_ARCHIVE",
            ReportShape::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ReportShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
