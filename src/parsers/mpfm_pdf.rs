//! MPFM PDF parser (§4.B.2). Detects the HOURLY/DAILY/PVT_CALIBRATION
//! sub-shape and extracts the production table, averages, and (for
//! calibration reports) K-factor comparisons from the text layer.

use super::{
    parse_numeric, CalibrationRecord, ParseOutcome, ParserRecord, ProductionRecord, ReportTypeHint,
};
use crate::domain::{CalibrationPhase, Phase, PhaseBank, ReportShape};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

static PERIOD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(hourly|daily) report from ([\d/:\-\s]+) to ([\d/:\-\s]+)").unwrap()
});
static BANK_FROM_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)bank\s*(\d+)").unwrap());
static RISER_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Riser\s+X?(\d+)\s*-\s*(\S+)").unwrap());
static PRESSURE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)average pressure[^\d\-]*([\d.,\-]+)\s*kpa").unwrap());
static TEMPERATURE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)average temperature[^\d\-]*([\d.,\-]+)\s*°?c").unwrap());
static CALIBRATION_NO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)calibration\s*(?:no\.?|number)\s*[:\-]?\s*(\S+)").unwrap());
static CALIBRATION_WINDOW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)calibration (?:window|period)\s*[:\-]?\s*([\d/:\-\s]+?)\s*to\s*([\d/:\-\s]+)").unwrap()
});
static SELECTED_MPFM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)selected mpfm\s*[:\-]?\s*(\S+)").unwrap());

const PRODUCTION_LABELS: [(&str, PhaseBank); 4] = [
    ("mpfm uncorrected mass", PhaseBank::UncorrectedMass),
    ("mpfm corrected mass", PhaseBank::CorrectedMass),
    ("pvt reference mass", PhaseBank::PvtRefMass20c),
    ("pvt reference volume", PhaseBank::PvtRefVol20c),
];

const PHASE_ORDER: [Phase; 5] = [Phase::Gas, Phase::Oil, Phase::Hc, Phase::Water, Phase::Total];

fn line_values(line: &str) -> Vec<f64> {
    line.split_whitespace()
        .filter_map(parse_numeric)
        .collect()
}

fn multi_format_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    for fmt in [
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(ts);
        }
    }
    None
}

fn extract_production_table(
    text: &str,
) -> BTreeMap<(PhaseBank, Phase), (f64, &'static str)> {
    let mut metrics = BTreeMap::new();
    for line in text.lines() {
        let lower = line.to_lowercase();
        for (label, bank) in PRODUCTION_LABELS {
            if bank == PhaseBank::PvtRefMass20c && !lower.contains("20") {
                continue;
            }
            if bank == PhaseBank::PvtRefVol20c && !lower.contains("20") {
                continue;
            }
            if lower.contains(label) {
                let values = line_values(line);
                for (phase, value) in PHASE_ORDER.iter().zip(values.iter()) {
                    metrics.insert((bank, *phase), (*value, bank.unit()));
                }
            }
        }
    }
    metrics
}

/// Parses the text layer of an MPFM report PDF. `text` is supplied by the
/// caller (extracted via `pdf_extract::extract_text`) so this function
/// stays testable without a real PDF fixture.
pub fn parse_mpfm_pdf_text(
    text: &str,
    filename_hint_daily: bool,
    asset_tag: &str,
) -> ParseOutcome {
    let mut warnings = Vec::new();

    let is_calibration = text.to_lowercase().contains("calibration factors")
        || text.to_lowercase().contains("average values");
    if is_calibration {
        return parse_calibration(text, asset_tag);
    }

    let Some(caps) = PERIOD_PATTERN.captures(text) else {
        return ParseOutcome::failed("no period header found in MPFM report".to_string());
    };
    let is_daily = caps[1].eq_ignore_ascii_case("daily") || filename_hint_daily;
    let Some(period_start) = multi_format_timestamp(&caps[2]) else {
        return ParseOutcome::failed("unparseable period start timestamp".to_string());
    };
    let Some(period_end) = multi_format_timestamp(&caps[3]) else {
        return ParseOutcome::failed("unparseable period end timestamp".to_string());
    };

    let bank = BANK_FROM_BODY.captures(text).map(|c| format!("B{}", &c[1]));
    let pressure = PRESSURE_LABEL
        .captures(text)
        .and_then(|c| parse_numeric(&c[1]));
    let temperature = TEMPERATURE_LABEL
        .captures(text)
        .and_then(|c| parse_numeric(&c[1]));

    if is_daily {
        let riser_sections: Vec<_> = RISER_HEADER.find_iter(text).collect();
        if !riser_sections.is_empty() {
            let mut records = Vec::new();
            for (i, m) in riser_sections.iter().enumerate() {
                let start = m.end();
                let end = riser_sections.get(i + 1).map(|n| n.start()).unwrap_or(text.len());
                let section_text = &text[start..end];
                let caps = RISER_HEADER.captures(m.as_str()).unwrap();
                let riser = caps.get(2).map(|m| m.as_str().to_string());
                let metrics = extract_production_table(section_text);
                records.push(ParserRecord::Production(ProductionRecord {
                    asset_tag: asset_tag.to_string(),
                    bank: bank.clone(),
                    stream: None,
                    riser,
                    report_type_hint: ReportTypeHint::Daily,
                    period_start: Some(period_start),
                    period_end,
                    metrics,
                    average_pressure: pressure.map(|p| (p, "kpa")),
                    average_temperature: temperature.map(|t| (t, "c")),
                    densities: BTreeMap::new(),
                    bsw_pct: None,
                    source_shape: ReportShape::MpfmDaily,
                    period_detail: BTreeMap::new(),
                }));
            }
            return ParseOutcome::ok(records, warnings);
        }
    }

    let metrics = extract_production_table(text);
    if metrics.is_empty() {
        warnings.push("no recognized production table rows".to_string());
    }

    let record = ProductionRecord {
        asset_tag: asset_tag.to_string(),
        bank,
        stream: None,
        riser: None,
        report_type_hint: if is_daily {
            ReportTypeHint::Daily
        } else {
            ReportTypeHint::Hourly
        },
        period_start: Some(period_start),
        period_end,
        metrics,
        average_pressure: pressure.map(|p| (p, "kpa")),
        average_temperature: temperature.map(|t| (t, "c")),
        densities: BTreeMap::new(),
        bsw_pct: None,
        source_shape: if is_daily {
            ReportShape::MpfmDaily
        } else {
            ReportShape::MpfmHourly
        },
        period_detail: BTreeMap::new(),
    };

    ParseOutcome::ok(vec![ParserRecord::Production(record)], warnings)
}

/// PVT calibration sub-shape (§4.B.2): K-factor comparisons, averages, and
/// accumulated masses MPFM vs separator. Applies the water-withheld /
/// outlier-range flags at canonicalization time, not here.
fn parse_calibration(text: &str, asset_tag: &str) -> ParseOutcome {
    let calibration_no = CALIBRATION_NO
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let mut used_k_factor = BTreeMap::new();
    let mut new_k_factor = BTreeMap::new();
    let mut densities_mpfm = BTreeMap::new();
    let mut densities_separator = BTreeMap::new();
    let mut accumulated_mass_mpfm = BTreeMap::new();
    let mut accumulated_mass_separator = BTreeMap::new();
    let mut average_pressure_mpfm = None;
    let mut average_pressure_separator = None;
    let mut average_temperature_mpfm = None;
    let mut average_temperature_separator = None;
    let mut warnings = Vec::new();

    for line in text.lines() {
        let lower = line.to_lowercase();

        // MPFM-vs-separator averages, like density/accumulated mass below,
        // report one value per side on the same line rather than per phase.
        if lower.contains("average pressure") {
            let values = line_values(line);
            average_pressure_mpfm = values.first().copied().or(average_pressure_mpfm);
            average_pressure_separator = values.get(1).copied().or(average_pressure_separator);
            continue;
        }
        if lower.contains("average temperature") {
            let values = line_values(line);
            average_temperature_mpfm = values.first().copied().or(average_temperature_mpfm);
            average_temperature_separator = values.get(1).copied().or(average_temperature_separator);
            continue;
        }

        let phase = [
            ("oil", CalibrationPhase::Oil),
            ("gas", CalibrationPhase::Gas),
            ("water", CalibrationPhase::Water),
            ("hc", CalibrationPhase::Hc),
        ]
        .into_iter()
        .find(|(label, _)| lower.contains(label))
        .map(|(_, phase)| phase);

        let Some(phase) = phase else { continue };
        let values = line_values(line);

        if lower.contains("mass correction factor") || lower.contains("k-factor") || lower.contains("k factor") {
            if let (Some(used), Some(new)) = (values.first(), values.get(1)) {
                used_k_factor.insert(phase, *used);
                new_k_factor.insert(phase, *new);
            }
        } else if lower.contains("density") {
            if let (Some(mpfm), Some(sep)) = (values.first(), values.get(1)) {
                densities_mpfm.insert(phase, *mpfm);
                densities_separator.insert(phase, *sep);
            }
        } else if lower.contains("accumulated mass") {
            if let (Some(mpfm), Some(sep)) = (values.first(), values.get(1)) {
                accumulated_mass_mpfm.insert(phase, *mpfm);
                accumulated_mass_separator.insert(phase, *sep);
            }
        }
    }

    if new_k_factor.is_empty() {
        warnings.push("no K-factor comparisons parsed from calibration report".to_string());
    }

    let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let window = CALIBRATION_WINDOW.captures(text).and_then(|c| {
        let start = multi_format_timestamp(&c[1]);
        let end = multi_format_timestamp(&c[2]);
        start.zip(end)
    });
    let (window_start, window_end) = match window {
        Some((start, end)) => (start, end),
        None => {
            warnings.push("no calibration window found in report text, defaulting to epoch".to_string());
            (epoch, epoch)
        }
    };

    let record = CalibrationRecord {
        asset_tag: asset_tag.to_string(),
        calibration_no,
        selected_mpfm: SELECTED_MPFM.captures(text).map(|c| c[1].to_string()),
        window_start,
        window_end,
        used_k_factor,
        new_k_factor,
        average_pressure_mpfm: average_pressure_mpfm.or_else(|| PRESSURE_LABEL.captures(text).and_then(|c| parse_numeric(&c[1]))),
        average_pressure_separator,
        average_temperature_mpfm: average_temperature_mpfm.or_else(|| TEMPERATURE_LABEL.captures(text).and_then(|c| parse_numeric(&c[1]))),
        average_temperature_separator,
        densities_mpfm,
        densities_separator,
        accumulated_mass_mpfm,
        accumulated_mass_separator,
    };

    ParseOutcome::ok(vec![ParserRecord::Calibration(record)], warnings)
}

/// Reads the text layer of a PDF file from disk and dispatches to
/// [`parse_mpfm_pdf_text`].
pub fn parse_mpfm_pdf(path: &Path, asset_tag: &str) -> ParseOutcome {
    let text = match pdf_extract::extract_text(path) {
        Ok(t) => t,
        Err(e) => return ParseOutcome::failed(format!("cannot extract PDF text: {e}")),
    };
    let filename_hint_daily = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_lowercase().contains("daily"))
        .unwrap_or(false);
    parse_mpfm_pdf_text(&text, filename_hint_daily, asset_tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hourly_period_header() {
        let text = "MPFM Hourly Report from 01/01/2026 00:00:00 to 01/01/2026 01:00:00\n\
                    MPFM Corrected Mass 10.0 20.0 5.0 2.0 37.0\n";
        let outcome = parse_mpfm_pdf_text(text, false, "13FT0367");
        assert!(outcome.success);
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn parses_riser_sections_in_daily_report() {
        let text = "MPFM Daily Report from 01/01/2026 00:00:00 to 02/01/2026 00:00:00\n\
                    Riser X1 - 13FT0367\n\
                    MPFM Corrected Mass 100.0 200.0 50.0 20.0 370.0\n\
                    Riser X2 - 13FT0368\n\
                    MPFM Corrected Mass 90.0 180.0 45.0 18.0 333.0\n";
        let outcome = parse_mpfm_pdf_text(text, true, "13FT0367");
        assert!(outcome.success);
        assert_eq!(outcome.records.len(), 2);
    }

    #[test]
    fn s6_calibration_report_extracts_k_factors() {
        let text = "Calibration Factors\n\
                    Oil Mass Correction Factor 1.00 1.02\n\
                    Gas Mass Correction Factor 1.00 0.9\n\
                    Water Mass Correction Factor 1.00 1.7\n\
                    Hc Mass Correction Factor 1.00 1.6\n";
        let outcome = parse_mpfm_pdf_text(text, false, "13FT0367");
        assert!(outcome.success);
        match &outcome.records[0] {
            ParserRecord::Calibration(cal) => {
                assert_eq!(cal.new_k_factor.get(&CalibrationPhase::Water), Some(&1.7));
                assert_eq!(cal.new_k_factor.get(&CalibrationPhase::Hc), Some(&1.6));
            }
            _ => panic!("expected calibration record"),
        }
    }

    #[test]
    fn calibration_window_and_selected_mpfm_are_extracted() {
        let text = "Calibration Number: CAL-042\n\
                    Selected MPFM: MPFM-B\n\
                    Calibration Window: 01/02/2026 00:00:00 to 01/02/2026 06:00:00\n\
                    Oil Mass Correction Factor 1.00 1.02\n\
                    Average Pressure 5000.0 5010.0\n\
                    Average Temperature 60.0 61.5\n";
        let outcome = parse_mpfm_pdf_text(text, false, "13FT0367");
        assert!(outcome.success);
        match &outcome.records[0] {
            ParserRecord::Calibration(cal) => {
                assert_eq!(cal.calibration_no, "CAL-042");
                assert_eq!(cal.selected_mpfm.as_deref(), Some("MPFM-B"));
                assert_eq!(cal.window_start.date(), chrono::NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
                assert_eq!(cal.window_end.time(), chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap());
                assert_eq!(cal.average_pressure_mpfm, Some(5000.0));
                assert_eq!(cal.average_pressure_separator, Some(5010.0));
                assert_eq!(cal.average_temperature_mpfm, Some(60.0));
                assert_eq!(cal.average_temperature_separator, Some(61.5));
            }
            _ => panic!("expected calibration record"),
        }
    }
}
