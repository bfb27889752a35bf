//! Per-shape parsers (§4.B). Each turns a file into a typed record stream;
//! malformed individual records degrade to warnings rather than aborting
//! the file (§9 "non-local error handling").

mod archive;
mod mpfm_pdf;
mod spreadsheet;
mod xml;

pub use archive::parse_archive;
pub use mpfm_pdf::parse_mpfm_pdf;
pub use spreadsheet::{parse_gas_balance_sheet, parse_spreadsheet};
pub use xml::parse_xml;

use crate::domain::{CalibrationPhase, Phase, PhaseBank, ReportShape};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One parsed measurement row before canonicalization. A sum type over
/// shape-specific variants (§9 "untyped containers from spreadsheet rows"),
/// so the Canonicalizer pattern-matches instead of reflecting over maps.
#[derive(Debug, Clone)]
pub enum ParserRecord {
    Production(ProductionRecord),
    Calibration(CalibrationRecord),
    GasBalance(GasBalanceRecord),
    AlarmEvent(AlarmEventRecord),
    AuditEvent(AuditEventRecord),
    FlowComputer(FlowComputerRecord),
    ArchiveMember(PathBuf),
}

/// One (asset, period) production observation, regardless of originating
/// shape (spreadsheet row, MPFM PDF section, or XML production period).
#[derive(Debug, Clone)]
pub struct ProductionRecord {
    pub asset_tag: String,
    pub bank: Option<String>,
    pub stream: Option<String>,
    pub riser: Option<String>,
    pub report_type_hint: ReportTypeHint,
    pub period_start: Option<NaiveDateTime>,
    pub period_end: NaiveDateTime,
    pub metrics: BTreeMap<(PhaseBank, Phase), (f64, &'static str)>,
    pub average_pressure: Option<(f64, &'static str)>,
    pub average_temperature: Option<(f64, &'static str)>,
    pub densities: BTreeMap<Phase, (f64, &'static str)>,
    pub bsw_pct: Option<f64>,
    pub source_shape: ReportShape,
    /// Auxiliary per-period fields outside the 30-metric grain (§4.B.3):
    /// `ctl`, `cpl`, `ctpl`, `meter_factor`, `totalizer_start`,
    /// `totalizer_end`. Only the XML parser currently populates these.
    pub period_detail: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTypeHint {
    Hourly,
    Daily,
}

#[derive(Debug, Clone)]
pub struct CalibrationRecord {
    pub asset_tag: String,
    pub calibration_no: String,
    pub selected_mpfm: Option<String>,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub used_k_factor: BTreeMap<CalibrationPhase, f64>,
    pub new_k_factor: BTreeMap<CalibrationPhase, f64>,
    pub average_pressure_mpfm: Option<f64>,
    pub average_pressure_separator: Option<f64>,
    pub average_temperature_mpfm: Option<f64>,
    pub average_temperature_separator: Option<f64>,
    pub densities_mpfm: BTreeMap<CalibrationPhase, f64>,
    pub densities_separator: BTreeMap<CalibrationPhase, f64>,
    pub accumulated_mass_mpfm: BTreeMap<CalibrationPhase, f64>,
    pub accumulated_mass_separator: BTreeMap<CalibrationPhase, f64>,
}

#[derive(Debug, Clone)]
pub struct GasBalanceRecord {
    pub business_date: chrono::NaiveDate,
    pub rows: Vec<GasBalanceRow>,
}

#[derive(Debug, Clone)]
pub struct GasBalanceRow {
    pub order: u32,
    pub sign: GasBalanceSign,
    pub description: String,
    pub flowrate: Option<f64>,
    pub pd: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasBalanceSign {
    Positive,
    Negative,
    Total,
}

/// One instrument entry from a pressure or temperature inventory (§4.B.3).
#[derive(Debug, Clone, Default)]
pub struct InstrumentRecord {
    pub serial: Option<String>,
    pub kind: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub range: Option<String>,
    pub last_calibration: Option<NaiveDateTime>,
    pub standard_uncertainty: Option<f64>,
}

impl InstrumentRecord {
    fn is_empty(&self) -> bool {
        self.serial.is_none()
            && self.kind.is_none()
            && self.manufacturer.is_none()
            && self.model.is_none()
    }
}

/// Flow-computer configuration snapshot read from an XML production shape
/// (§4.B.3): serial, collection timestamp, ambient/reference conditions,
/// software version, the primary element's indexed meter-factor/pulse-count
/// pairs, and the pressure/temperature instrument inventories. Not part of
/// the 30-metric reconciliation grain.
#[derive(Debug, Clone, Default)]
pub struct FlowComputerRecord {
    pub asset_tag: String,
    pub serial: Option<String>,
    pub collected_at: Option<NaiveDateTime>,
    pub ambient_temperature_c: Option<f64>,
    pub ambient_pressure_kpa: Option<f64>,
    pub reference_temperature_c: Option<f64>,
    pub reference_pressure_kpa: Option<f64>,
    pub software_version: Option<String>,
    pub meter_factors: Vec<(f64, f64)>,
    pub pressure_instruments: Vec<InstrumentRecord>,
    pub temperature_instruments: Vec<InstrumentRecord>,
}

impl FlowComputerRecord {
    pub fn is_empty(&self) -> bool {
        self.serial.is_none()
            && self.collected_at.is_none()
            && self.software_version.is_none()
            && self.meter_factors.is_empty()
            && self.pressure_instruments.is_empty()
            && self.temperature_instruments.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AlarmEventRecord {
    pub asset_tag: String,
    pub timestamp: NaiveDateTime,
    pub parameter: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct AuditEventRecord {
    pub asset_tag: String,
    pub timestamp: NaiveDateTime,
    pub parameter: String,
    pub old_value: String,
    pub new_value: String,
}

/// Result of parsing one file (§4.B). `success = false` only for files that
/// are entirely unreadable; individual bad rows surface as `warnings`.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub records: Vec<ParserRecord>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub success: bool,
}

impl ParseOutcome {
    pub fn ok(records: Vec<ParserRecord>, warnings: Vec<String>) -> Self {
        Self {
            records,
            warnings,
            errors: Vec::new(),
            success: true,
        }
    }

    pub fn failed(reason: String) -> Self {
        Self {
            records: Vec::new(),
            warnings: Vec::new(),
            errors: vec![reason],
            success: false,
        }
    }
}

/// Parses the absent-value tokens recognized across every shape (§4.B.1).
pub(crate) fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || matches!(
            trimmed,
            "-" | "N/A" | "n/a" | "#REF!" | "null" | "None" | "NULL"
        )
    {
        return None;
    }
    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.replace(',', "")
    };
    normalized.parse::<f64>().ok()
}

pub(crate) static ASSET_TAG_PATTERN: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"^\d{2}[A-Z]{2}\d{4}[A-B]?$").unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numeric_handles_both_decimal_separators() {
        assert_eq!(parse_numeric("123.45"), Some(123.45));
        assert_eq!(parse_numeric("123,45"), Some(123.45));
        assert_eq!(parse_numeric("1,234.5"), Some(1234.5));
    }

    #[test]
    fn parse_numeric_absent_tokens() {
        for token in ["-", "N/A", "#REF!", "null", "None", ""] {
            assert_eq!(parse_numeric(token), None);
        }
    }

    #[test]
    fn asset_tag_grammar() {
        assert!(ASSET_TAG_PATTERN.is_match("13FT0367"));
        assert!(ASSET_TAG_PATTERN.is_match("13FT0367A"));
        assert!(!ASSET_TAG_PATTERN.is_match("not-a-tag"));
    }
}
