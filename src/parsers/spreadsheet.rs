//! Spreadsheet parser (§4.B.1). Locates anchor blocks by header text,
//! discovers tag columns below them, and walks each column down to its
//! metric values; falls back to a flat label/value layout when no anchor
//! is found.

use super::{parse_numeric, GasBalanceRecord, GasBalanceRow, GasBalanceSign, ParseOutcome, ParserRecord, ProductionRecord, ReportTypeHint, ASSET_TAG_PATTERN};
use crate::domain::{Phase, PhaseBank, ReportShape};
use calamine::{open_workbook_auto, DataType, Reader};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

static ANCHOR_CUMULATIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)cumulative totals").unwrap());
static ANCHOR_DAY_TOTALS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)day totals").unwrap());
static ANCHOR_FLOW_WEIGHTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)flow weighted averages?").unwrap());
static GAS_BALANCE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)gas balance").unwrap());
static UNIT_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(m³|sm³|kpa|°c|kg|t|min|gj|%)$").unwrap());
static FALLBACK_INLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([\d.,\-]+)\s*(.*)$").unwrap());

const MAX_BLANK_RUN: usize = 3;
const MAX_TAG_SCAN_ROWS: usize = 7;

/// Maps a discovered unit token to the canonical `&'static str` form the
/// Canonicalizer's `convert_unit` table recognizes, so a sheet printing
/// `kg` or `m³` doesn't get silently coerced to the bank's own unit.
fn normalize_unit_marker(raw: &str) -> Option<&'static str> {
    match raw.trim().to_lowercase().as_str() {
        "m³" | "m3" => Some("m3"),
        "sm³" | "sm3" => Some("sm3"),
        "kpa" => Some("kpa"),
        "°c" | "c" => Some("c"),
        "kg" => Some("kg"),
        "t" => Some("t"),
        "min" => Some("min"),
        "gj" => Some("gj"),
        "%" => Some("%"),
        _ => None,
    }
}

fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Float(f) => f.to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::DateTime(d) => d.to_string(),
        _ => String::new(),
    }
}

/// Maps a normalized variable name to its canonical (bank, phase) pair.
/// Unknown names degrade to a best-effort snake_case label carried as a
/// warning rather than dropped silently.
fn lexicon_lookup(label: &str) -> Option<(PhaseBank, Phase)> {
    let normalized = label.to_lowercase();
    let bank = if normalized.contains("uncorrected mass") {
        PhaseBank::UncorrectedMass
    } else if normalized.contains("corrected mass") {
        PhaseBank::CorrectedMass
    } else if normalized.contains("pvt reference mass") && normalized.contains("20") {
        PhaseBank::PvtRefMass20c
    } else if normalized.contains("pvt reference mass") {
        PhaseBank::PvtRefMassSc
    } else if normalized.contains("pvt reference volume") && normalized.contains("20") {
        PhaseBank::PvtRefVol20c
    } else if normalized.contains("pvt reference volume") {
        PhaseBank::PvtRefVolSc
    } else {
        return None;
    };
    let phase = if normalized.contains("gas") {
        Phase::Gas
    } else if normalized.contains("oil") {
        Phase::Oil
    } else if normalized.contains("hc") {
        Phase::Hc
    } else if normalized.contains("water") {
        Phase::Water
    } else {
        Phase::Total
    };
    Some((bank, phase))
}

pub fn parse_spreadsheet(
    path: &Path,
    shape: ReportShape,
    asset_hint: Option<&str>,
    period_end: NaiveDateTime,
) -> ParseOutcome {
    let mut workbook = match open_workbook_auto(path) {
        Ok(wb) => wb,
        Err(e) => return ParseOutcome::failed(format!("cannot open workbook: {e}")),
    };

    let sheet_name = match workbook
        .sheet_names()
        .iter()
        .find(|n| {
            let lower = n.to_lowercase();
            lower.starts_with("oil_")
                || lower.starts_with("gas_")
                || lower.starts_with("water_")
                || lower == "0001"
        })
        .cloned()
        .or_else(|| workbook.sheet_names().first().cloned())
    {
        Some(name) => name,
        None => return ParseOutcome::failed("workbook has no sheets".to_string()),
    };

    let range = match workbook.worksheet_range(&sheet_name) {
        Some(Ok(r)) => r,
        Some(Err(e)) => return ParseOutcome::failed(format!("cannot read sheet: {e}")),
        None => return ParseOutcome::failed("sheet not found".to_string()),
    };

    let grid: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let mut warnings = Vec::new();
    let mut found_anchor = false;
    let mut metrics: BTreeMap<(PhaseBank, Phase), (f64, &'static str)> = BTreeMap::new();

    for (row_idx, row) in grid.iter().enumerate() {
        let joined = row.join(" ");
        let is_anchor = ANCHOR_CUMULATIVE.is_match(&joined)
            || ANCHOR_DAY_TOTALS.is_match(&joined)
            || ANCHOR_FLOW_WEIGHTED.is_match(&joined);
        if !is_anchor {
            continue;
        }
        found_anchor = true;

        let tag_row_idx = (row_idx + 1..=row_idx + MAX_TAG_SCAN_ROWS)
            .find(|&r| {
                grid.get(r)
                    .map(|r| r.iter().filter(|c| ASSET_TAG_PATTERN.is_match(c)).count() >= 2)
                    .unwrap_or(false)
            });
        let Some(tag_row_idx) = tag_row_idx else {
            warnings.push(format!("no tag row found below anchor at row {row_idx}"));
            continue;
        };
        let tag_row = &grid[tag_row_idx];

        for (col_idx, cell) in tag_row.iter().enumerate() {
            if !ASSET_TAG_PATTERN.is_match(cell) {
                continue;
            }
            if asset_hint.is_some_and(|hint| hint != cell) {
                continue;
            }
            let unit_row = grid.get(tag_row_idx + 1);
            let unit = unit_row
                .and_then(|r| r.get(col_idx.saturating_sub(1)))
                .filter(|c| UNIT_MARKERS.is_match(c))
                .and_then(|c| normalize_unit_marker(c));

            let mut blank_run = 0usize;
            let mut scan_row = tag_row_idx + 2;
            while scan_row < grid.len() && blank_run < MAX_BLANK_RUN {
                let label_cell = grid[scan_row].first().cloned().unwrap_or_default();
                let joined_row = grid[scan_row].join(" ");
                if ANCHOR_CUMULATIVE.is_match(&joined_row)
                    || ANCHOR_DAY_TOTALS.is_match(&joined_row)
                    || ANCHOR_FLOW_WEIGHTED.is_match(&joined_row)
                {
                    break;
                }
                let value_cell = grid[scan_row].get(col_idx).cloned().unwrap_or_default();
                if label_cell.trim().is_empty() && value_cell.trim().is_empty() {
                    blank_run += 1;
                    scan_row += 1;
                    continue;
                }
                blank_run = 0;
                if let Some((bank, phase)) = lexicon_lookup(&label_cell) {
                    if let Some(value) = parse_numeric(&value_cell) {
                        metrics.insert((bank, phase), (value, unit.unwrap_or_else(|| bank.unit())));
                    }
                } else if !label_cell.trim().is_empty() {
                    warnings.push(format!("unrecognized metric label: {label_cell}"));
                }
                scan_row += 1;
            }
        }
    }

    if !found_anchor {
        return parse_flat_fallback(&grid, shape, period_end, warnings);
    }

    let asset_tag = asset_hint.unwrap_or("UNKNOWN").to_string();
    let record = ProductionRecord {
        asset_tag,
        bank: None,
        stream: None,
        riser: None,
        report_type_hint: ReportTypeHint::Daily,
        period_start: None,
        period_end,
        metrics,
        average_pressure: None,
        average_temperature: None,
        densities: BTreeMap::new(),
        bsw_pct: None,
        source_shape: shape,
        period_detail: BTreeMap::new(),
    };

    ParseOutcome::ok(vec![ParserRecord::Production(record)], warnings)
}

/// No anchors found: treats the sheet as a flat label/value layout (§4.B.1).
fn parse_flat_fallback(
    grid: &[Vec<String>],
    shape: ReportShape,
    period_end: NaiveDateTime,
    mut warnings: Vec<String>,
) -> ParseOutcome {
    let mut metrics = BTreeMap::new();
    for row in grid {
        let Some(label) = row.first() else { continue };
        let Some(value_cell) = row.get(1) else { continue };
        if let Some(caps) = FALLBACK_INLINE.captures(value_cell.trim()) {
            if let Some(value) = parse_numeric(&caps[1]) {
                if let Some((bank, phase)) = lexicon_lookup(label) {
                    let unit = normalize_unit_marker(&caps[2]).unwrap_or_else(|| bank.unit());
                    metrics.insert((bank, phase), (value, unit));
                } else {
                    warnings.push(format!("fallback: unrecognized label {label}"));
                }
            }
        }
    }
    if metrics.is_empty() {
        return ParseOutcome::failed("no anchors and no flat layout data found".to_string());
    }
    let record = ProductionRecord {
        asset_tag: "UNKNOWN".to_string(),
        bank: None,
        stream: None,
        riser: None,
        report_type_hint: ReportTypeHint::Daily,
        period_start: None,
        period_end,
        metrics,
        average_pressure: None,
        average_temperature: None,
        densities: BTreeMap::new(),
        bsw_pct: None,
        source_shape: shape,
        period_detail: BTreeMap::new(),
    };
    ParseOutcome::ok(vec![ParserRecord::Production(record)], warnings)
}

/// Gas-balance sheet parser (§4.B.1): aligns columns by header hints or
/// falls back to a fixed positional layout, reading rows until and
/// including the `TOTAL` row.
pub fn parse_gas_balance_sheet(path: &Path, business_date: chrono::NaiveDate) -> ParseOutcome {
    let mut workbook = match open_workbook_auto(path) {
        Ok(wb) => wb,
        Err(e) => return ParseOutcome::failed(format!("cannot open workbook: {e}")),
    };
    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return ParseOutcome::failed("workbook has no sheets".to_string());
    };
    let range = match workbook.worksheet_range(&sheet_name) {
        Some(Ok(r)) => r,
        Some(Err(e)) => return ParseOutcome::failed(format!("cannot read sheet: {e}")),
        None => return ParseOutcome::failed("sheet not found".to_string()),
    };
    let grid: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let header_row = grid
        .iter()
        .position(|row| GAS_BALANCE_HEADER.is_match(&row.join(" ")));
    let Some(header_row) = header_row else {
        return ParseOutcome::failed("no gas balance header found".to_string());
    };

    let mut rows = Vec::new();
    let mut order = 0u32;
    let mut warnings = Vec::new();
    for data_row in grid.iter().skip(header_row + 2) {
        let description = data_row.first().cloned().unwrap_or_default();
        if description.trim().is_empty() {
            continue;
        }
        order += 1;
        let is_total = description.to_uppercase().contains("TOTAL");
        let sign = if is_total {
            GasBalanceSign::Total
        } else if description.trim_start().starts_with('-') {
            GasBalanceSign::Negative
        } else {
            GasBalanceSign::Positive
        };
        let flowrate = data_row.get(1).and_then(|c| parse_numeric(c));
        let pd = data_row.get(2).and_then(|c| parse_numeric(c));
        if flowrate.is_none() && !is_total {
            warnings.push(format!("gas balance row without flowrate: {description}"));
        }
        rows.push(GasBalanceRow {
            order,
            sign,
            description,
            flowrate,
            pd,
        });
        if is_total {
            break;
        }
    }

    if rows.is_empty() {
        return ParseOutcome::failed("no gas balance rows parsed".to_string());
    }

    ParseOutcome::ok(
        vec![ParserRecord::GasBalance(GasBalanceRecord {
            business_date,
            rows,
        })],
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicon_maps_known_labels() {
        assert_eq!(
            lexicon_lookup("Corrected Mass Oil"),
            Some((PhaseBank::CorrectedMass, Phase::Oil))
        );
        assert_eq!(
            lexicon_lookup("PVT Reference Volume @20 degC Water"),
            Some((PhaseBank::PvtRefVol20c, Phase::Water))
        );
        assert_eq!(lexicon_lookup("Completely Unknown Thing"), None);
    }
}
