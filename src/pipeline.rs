//! Orchestrates Stager -> Classifier -> Parser -> Canonicalizer -> Store,
//! then runs the Reconciler, Cross-validator, and Daily analyzer over every
//! `(asset, business_date)` pair the run touched (§4.I, §5).
//!
//! File-level work fans out over a `rayon` thread pool sized by
//! `config.workers`, the way the teacher's batch scans parallelize over
//! independent units of work; a shared `AtomicBool` lets a fatal error in
//! one file stop the rest of an in-flight batch without tearing down the
//! pool.

use crate::analyzer;
use crate::canonicalizer;
use crate::classifier;
use crate::config::Config;
use crate::cross_validator;
use crate::domain::{all_metric_keys, Alert, AssetId, BatchId, BatchStatus, ParseStatus, RawFileId, ReportShape};
use crate::error::{PipelineError, StageError};
use crate::parsers::{self, GasBalanceRow, ParseOutcome, ParserRecord};
use crate::reconciler;
use crate::stager;
use crate::store::Store;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Outcome of one `ingest` call: how many files were touched, which
/// `(asset, business_date)` pairs now need downstream analysis, and any
/// facility-wide gas-balance rows discovered, keyed by the date they cover.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub files_seen: u32,
    pub files_parsed: u32,
    pub files_failed: u32,
    pub affected: BTreeSet<(AssetId, NaiveDate)>,
    pub gas_balance_by_date: BTreeMap<NaiveDate, Vec<GasBalanceRow>>,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.files_seen += other.files_seen;
        self.files_parsed += other.files_parsed;
        self.files_failed += other.files_failed;
        self.affected.extend(other.affected);
        for (date, rows) in other.gas_balance_by_date {
            self.gas_balance_by_date.entry(date).or_default().extend(rows);
        }
    }
}

/// Result of running Reconciler + Cross-validator over one affected pair.
#[derive(Debug)]
pub struct DayReport {
    pub asset_id: AssetId,
    pub business_date: NaiveDate,
    pub overall_verdict: Option<crate::domain::Verdict>,
}

static DATE_IN_FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})-?(\d{2})-?(\d{2})").unwrap());

/// Best-effort period-end recovery for shapes that don't carry their own
/// timestamp header (plain spreadsheets): a date embedded in the filename,
/// falling back to the file's modification time.
fn infer_period_end(path: &Path) -> NaiveDateTime {
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if let Some(caps) = DATE_IN_FILENAME.captures(filename) {
        if let (Ok(y), Ok(m), Ok(d)) = (caps[1].parse(), caps[2].parse(), caps[3].parse()) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return date.and_hms_opt(23, 59, 59).unwrap();
            }
        }
    }
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .and_then(|d| chrono::DateTime::<Utc>::from_timestamp(d.as_secs() as i64, 0))
        .map(|dt| dt.naive_utc())
        .unwrap_or_else(|| Utc::now().naive_utc())
}

fn asset_hint_from_filename(path: &Path) -> Option<String> {
    let filename = path.file_name().and_then(|n| n.to_str())?;
    filename
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|token| parsers::ASSET_TAG_PATTERN.is_match(token))
        .map(|s| s.to_string())
}

fn read_content_sample(path: &Path) -> Option<String> {
    let extension = path.extension().and_then(|e| e.to_str())?.to_lowercase();
    if !matches!(extension.as_str(), "txt" | "xml") {
        return None;
    }
    std::fs::read(path).ok().map(|bytes| {
        let cap = bytes.len().min(4096);
        String::from_utf8_lossy(&bytes[..cap]).to_string()
    })
}

fn dispatch_parse(path: &Path, shape: ReportShape, asset_hint: Option<&str>) -> ParseOutcome {
    match shape {
        ReportShape::SpreadsheetDailyOil
        | ReportShape::SpreadsheetDailyGas
        | ReportShape::SpreadsheetDailyWater => {
            parsers::parse_spreadsheet(path, shape, asset_hint, infer_period_end(path))
        }
        ReportShape::SpreadsheetGasBalance => {
            parsers::parse_gas_balance_sheet(path, infer_period_end(path).date())
        }
        ReportShape::MpfmHourly | ReportShape::MpfmDaily | ReportShape::MpfmPvtCalibration => {
            parsers::parse_mpfm_pdf(path, asset_hint.unwrap_or("UNKNOWN"))
        }
        ReportShape::Xml001 | ReportShape::Xml002 | ReportShape::Xml003 | ReportShape::Xml004 => {
            parsers::parse_xml(path, shape, asset_hint.unwrap_or("UNKNOWN"))
        }
        ReportShape::BatchArchive | ReportShape::Unknown => {
            ParseOutcome::failed(format!("{shape} is not directly parseable"))
        }
    }
}

/// Runs a closure on a worker thread and fails with [`StageError::Timeout`]
/// if it doesn't finish within `timeout` (§5 "per-file timeout").
fn parse_with_timeout(
    timeout: Duration,
    work: impl FnOnce() -> ParseOutcome + Send + 'static,
) -> Result<ParseOutcome, StageError> {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(work());
    });
    rx.recv_timeout(timeout)
        .map_err(|_| StageError::Timeout(timeout))
}

/// Canonicalizes every record a parser produced, accumulating the
/// `(asset, business_date)` pairs touched and any gas-balance rows (which
/// don't canonicalize into facts; the analyzer reads them directly).
fn canonicalize_records(
    store: &Store,
    records: &[ParserRecord],
    source_raw_file: RawFileId,
    report: &mut IngestReport,
) -> Result<(), PipelineError> {
    for record in records {
        match record {
            ParserRecord::Production(production) => {
                let fact = canonicalizer::canonicalize_production(store, production, source_raw_file)?;
                report.affected.insert((fact.asset_id, fact.business_date));
            }
            ParserRecord::Calibration(calibration) => {
                canonicalizer::canonicalize_calibration(store, calibration, source_raw_file)?;
            }
            ParserRecord::GasBalance(gas_balance) => {
                report
                    .gas_balance_by_date
                    .entry(gas_balance.business_date)
                    .or_default()
                    .extend(gas_balance.rows.iter().cloned());
            }
            ParserRecord::FlowComputer(flow_computer) => {
                canonicalizer::canonicalize_flow_computer(store, flow_computer, source_raw_file)?;
            }
            ParserRecord::AlarmEvent(_) | ParserRecord::AuditEvent(_) => {}
            ParserRecord::ArchiveMember(_) => {}
        }
    }
    Ok(())
}

/// Processes one file end to end: classify, stage, parse, canonicalize.
/// Archive members recurse through this same function with the archive's
/// batch id attached.
fn process_one_file(
    store: &Store,
    config: &Config,
    path: &Path,
    parent_batch: Option<BatchId>,
    cancelled: &AtomicBool,
) -> IngestReport {
    let mut report = IngestReport {
        files_seen: 1,
        ..Default::default()
    };

    if cancelled.load(Ordering::Relaxed) {
        return report;
    }

    let sample = read_content_sample(path);
    let shape = match classifier::classify(path, sample.as_deref()) {
        Ok(shape) => shape,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "classification failed");
            report.files_failed = 1;
            return report;
        }
    };

    let stage_result = match stager::stage(store, path, shape, parent_batch, config.force_reparse) {
        Ok(r) => r,
        Err(e) => {
            error!(path = %path.display(), error = %e, "staging failed");
            report.files_failed = 1;
            return report;
        }
    };
    if !stage_result.should_parse {
        return report;
    }

    if shape == ReportShape::BatchArchive {
        process_archive(store, config, path, stage_result.raw_file_id, cancelled, &mut report);
        return report;
    }

    let asset_hint = asset_hint_from_filename(path);
    let timeout = Duration::from_secs(config.parse_timeout_seconds);
    let path_owned = path.to_path_buf();
    let outcome = parse_with_timeout(timeout, move || dispatch_parse(&path_owned, shape, asset_hint.as_deref()));

    let outcome = match outcome {
        Ok(o) => o,
        Err(e) => {
            error!(path = %path.display(), error = %e, "parse timed out");
            let _ = store.finish_raw_file(stage_result.raw_file_id, ParseStatus::Failed, 0, &[], &[e.to_string()]);
            report.files_failed = 1;
            return report;
        }
    };

    if !outcome.success {
        let _ = store.finish_raw_file(
            stage_result.raw_file_id,
            ParseStatus::Failed,
            0,
            &outcome.warnings,
            &outcome.errors,
        );
        report.files_failed = 1;
        return report;
    }

    if let Err(e) = canonicalize_records(store, &outcome.records, stage_result.raw_file_id, &mut report) {
        error!(path = %path.display(), error = %e, "canonicalization failed");
        let _ = store.finish_raw_file(
            stage_result.raw_file_id,
            ParseStatus::Failed,
            0,
            &outcome.warnings,
            &[e.to_string()],
        );
        report.files_failed = 1;
        return report;
    }

    let _ = store.finish_raw_file(
        stage_result.raw_file_id,
        ParseStatus::Success,
        outcome.records.len() as u32,
        &outcome.warnings,
        &[],
    );
    report.files_parsed = 1;
    report
}

fn process_archive(
    store: &Store,
    config: &Config,
    path: &Path,
    raw_file_id: RawFileId,
    cancelled: &AtomicBool,
    report: &mut IngestReport,
) {
    let (_temp_dir, outcome) = match parsers::parse_archive(path) {
        Ok(v) => v,
        Err(e) => {
            error!(path = %path.display(), error = %e, "archive extraction failed");
            let _ = store.finish_raw_file(raw_file_id, ParseStatus::Failed, 0, &[], &[e.to_string()]);
            report.files_failed = 1;
            return;
        }
    };

    if !outcome.success {
        let _ = store.finish_raw_file(raw_file_id, ParseStatus::Failed, 0, &outcome.warnings, &outcome.errors);
        report.files_failed = 1;
        return;
    }

    let member_paths: Vec<PathBuf> = outcome
        .records
        .into_iter()
        .filter_map(|r| match r {
            ParserRecord::ArchiveMember(p) => Some(p),
            _ => None,
        })
        .collect();

    let fingerprint = stager::fingerprint_file(path).unwrap_or_default();
    let batch_id = stager::stage_batch(
        store,
        &path.display().to_string(),
        &fingerprint,
        member_paths.len() as u32,
    )
    .ok();

    let sub_reports: Vec<IngestReport> = member_paths
        .par_iter()
        .map(|member| process_one_file(store, config, member, batch_id, cancelled))
        .collect();

    for sub in sub_reports {
        report.merge(sub);
    }
    if let Some(batch_id) = batch_id {
        let _ = store.set_batch_status(batch_id, BatchStatus::from_outcomes(report.files_parsed, report.files_seen, false));
    }
    let _ = store.finish_raw_file(raw_file_id, ParseStatus::Success, member_paths.len() as u32, &outcome.warnings, &[]);
}

fn collect_files(root: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if root.is_file() {
        out.push(root.to_path_buf());
        return Ok(());
    }
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Top-level entry point for the `ingest` command: walks `root` (a single
/// file or a directory), processes every discovered file, and returns the
/// set of `(asset, business_date)` pairs a caller should run downstream
/// analysis over.
pub fn ingest(store: &Store, config: &Config, root: &Path) -> Result<IngestReport, PipelineError> {
    let mut files = Vec::new();
    collect_files(root, &mut files)
        .map_err(|e| PipelineError::Config(format!("cannot walk {}: {e}", root.display())))?;

    info!(count = files.len(), root = %root.display(), "discovered files to ingest");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()
        .map_err(|e| PipelineError::Config(e.to_string()))?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let reports: Vec<IngestReport> = pool.install(|| {
        files
            .par_iter()
            .map(|path| process_one_file(store, config, path, None, &cancelled))
            .collect()
    });

    let mut total = IngestReport::default();
    for r in reports {
        total.merge(r);
    }
    Ok(total)
}

/// Runs the Reconciler and Cross-validator for one affected pair (§4.E,
/// §4.F), reading every source shape's raw observations back from the
/// store to build the [`crate::domain::SourceValues`] the cross-validator
/// classifies.
pub fn analyze_affected(
    store: &Store,
    config: &Config,
    asset_id: AssetId,
    business_date: NaiveDate,
) -> Result<DayReport, PipelineError> {
    let verdicts = reconciler::reconcile(store, asset_id, business_date, &config.reconciliation)?;
    let overall_verdict = reconciler::overall_status(&verdicts);

    for (bank, _phase, metric_key) in all_metric_keys() {
        for time_window in ["hourly", "daily"] {
            let values = store.source_values_for(asset_id, business_date, time_window, &metric_key)?;
            if values.present().is_empty() {
                continue;
            }
            let cross = cross_validator::classify(
                asset_id,
                business_date,
                time_window,
                &metric_key,
                values,
                &config.cross_validation,
                bank.tolerance_class(),
            );
            store.upsert_cross_verdict(&cross)?;
            cross_validator::update_streak(
                store,
                asset_id,
                &metric_key,
                business_date,
                cross.classification,
                config.cross_validation.escalation_days,
            )?;
        }
    }

    let (daily, hourlies) = store.facts_for_business_date(asset_id, business_date)?;
    let bsw_pct = daily
        .as_ref()
        .and_then(|f| f.bsw_pct)
        .or_else(|| hourlies.iter().find_map(|f| f.bsw_pct));
    analyzer::analyze_day(store, asset_id, business_date, bsw_pct, None)?;

    Ok(DayReport {
        asset_id,
        business_date,
        overall_verdict,
    })
}

/// Runs the facility-wide gas-balance check for one date (§4.H); not keyed
/// by asset, so it runs once per date rather than inside [`analyze_affected`].
pub fn analyze_gas_balance(
    store: &Store,
    business_date: NaiveDate,
    rows: &[GasBalanceRow],
) -> Result<Option<Alert>, PipelineError> {
    let alert = analyzer::check_gas_balance(store, business_date, rows)?;
    if let Some(alert) = &alert {
        store.insert_alert(alert)?;
    }
    Ok(alert)
}

/// §4.H missing-data sweep: for every business date this run touched,
/// checks every *active* asset, not only the ones a file happened to
/// report for that date (mirrors `daily_analyzer.py`'s whole-fleet sweep).
/// Assets already covered by [`analyze_affected`]'s bundled
/// `check_missing_data` call are skipped here to avoid a duplicate alert.
pub fn sweep_missing_data(store: &Store, report: &IngestReport) -> Result<Vec<Alert>, PipelineError> {
    let dates: BTreeSet<NaiveDate> = report.affected.iter().map(|(_, date)| *date).collect();
    let active_assets = store.active_asset_ids()?;

    let mut alerts = Vec::new();
    for date in dates {
        for &asset_id in &active_assets {
            if report.affected.contains(&(asset_id, date)) {
                continue;
            }
            if let Some(alert) = analyzer::check_missing_data(store, asset_id, date)? {
                store.insert_alert(&alert)?;
                alerts.push(alert);
            }
        }
    }
    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_period_end_reads_filename_date() {
        let inferred = infer_period_end(Path::new("GasBalance_2026-01-15.xlsx"));
        assert_eq!(inferred.date(), NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
    }

    #[test]
    fn asset_hint_extracts_tag_token() {
        let hint = asset_hint_from_filename(Path::new("MPFM_Hourly_13FT0367.pdf"));
        assert_eq!(hint.as_deref(), Some("13FT0367"));
    }

    #[test]
    fn ingest_empty_directory_is_a_no_op() {
        let store = Store::open_in_memory().unwrap();
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let report = ingest(&store, &config, dir.path()).unwrap();
        assert_eq!(report.files_seen, 0);
    }
}
