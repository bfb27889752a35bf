//! Assigns a [`ReportShape`] to an input file from its filename and,
//! failing that, a content sample (§4.A).

use crate::domain::ReportShape;
use crate::error::ClassifyError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static XML_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{3})_").unwrap());

static HEADER_PATTERNS: Lazy<Vec<(Regex, ReportShape)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)mpfm.*hourly report").unwrap(),
            ReportShape::MpfmHourly,
        ),
        (
            Regex::new(r"(?i)mpfm.*daily report").unwrap(),
            ReportShape::MpfmDaily,
        ),
        (
            Regex::new(r"(?i)calibration factors|average values").unwrap(),
            ReportShape::MpfmPvtCalibration,
        ),
        (
            Regex::new(r"(?i)cumulative totals").unwrap(),
            ReportShape::SpreadsheetDailyOil,
        ),
        (
            Regex::new(r"(?i)gas balance").unwrap(),
            ReportShape::SpreadsheetGasBalance,
        ),
    ]
});

const ARCHIVE_EXTENSIONS: &[&str] = &["zip"];

/// Evaluated in order, first match wins (§4.A). `content_sample`, when
/// supplied, is the first text page/sheet of the file, used only as a
/// fallback once filename rules are exhausted.
pub fn classify(path: &Path, content_sample: Option<&str>) -> Result<ReportShape, ClassifyError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if ARCHIVE_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(ReportShape::BatchArchive);
    }

    if extension == "xml" {
        if let Some(caps) = XML_PREFIX.captures(&filename) {
            return Ok(match &caps[1] {
                "001" => ReportShape::Xml001,
                "002" => ReportShape::Xml002,
                "003" => ReportShape::Xml003,
                "004" => ReportShape::Xml004,
                _ => ReportShape::Unknown,
            });
        }
    }

    if filename.contains("mpfm") {
        if filename.contains("hourly") {
            return Ok(ReportShape::MpfmHourly);
        }
        if filename.contains("daily") {
            return Ok(ReportShape::MpfmDaily);
        }
    }
    if filename.contains("pvtcalibration") {
        return Ok(ReportShape::MpfmPvtCalibration);
    }
    if filename.contains("daily_oil") {
        return Ok(ReportShape::SpreadsheetDailyOil);
    }
    if filename.contains("daily_gas") {
        return Ok(ReportShape::SpreadsheetDailyGas);
    }
    if filename.contains("daily_water") {
        return Ok(ReportShape::SpreadsheetDailyWater);
    }
    if filename.contains("gasbalance") {
        return Ok(ReportShape::SpreadsheetGasBalance);
    }

    if let Some(sample) = content_sample {
        for (pattern, shape) in HEADER_PATTERNS.iter() {
            if pattern.is_match(sample) {
                return Ok(*shape);
            }
        }
    }

    Ok(ReportShape::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn archive_extension_wins_first() {
        let shape = classify(&PathBuf::from("daily_oil_batch.zip"), None).unwrap();
        assert_eq!(shape, ReportShape::BatchArchive);
    }

    #[test]
    fn xml_numeric_prefix_routes_by_shape() {
        let shape = classify(&PathBuf::from("001_12345678_20260101000000_INST.xml"), None).unwrap();
        assert_eq!(shape, ReportShape::Xml001);
        let shape = classify(&PathBuf::from("004_12345678_20260101000000_INST.xml"), None).unwrap();
        assert_eq!(shape, ReportShape::Xml004);
    }

    #[test]
    fn filename_substring_rules() {
        assert_eq!(
            classify(&PathBuf::from("MPFM_Hourly_13FT0367.pdf"), None).unwrap(),
            ReportShape::MpfmHourly
        );
        assert_eq!(
            classify(&PathBuf::from("GasBalance_2026-01-01.xlsx"), None).unwrap(),
            ReportShape::SpreadsheetGasBalance
        );
    }

    #[test]
    fn content_sniffing_is_deterministic() {
        let path = PathBuf::from("unrecognized.txt");
        let sample = "MPFM Hourly Report from 00:00 to 01:00";
        let first = classify(&path, Some(sample)).unwrap();
        let second = classify(&path, Some(sample)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, ReportShape::MpfmHourly);
    }

    #[test]
    fn unrecognized_file_is_unknown() {
        let shape = classify(&PathBuf::from("mystery.dat"), None).unwrap();
        assert_eq!(shape, ReportShape::Unknown);
    }
}
