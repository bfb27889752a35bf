//! Transactional fact and dimension storage (§4.G).
//!
//! Durable, relational (SQLite via `rusqlite`), following the teacher's
//! `db_storage`/`data_pipeline` convention: a single connection wrapped in
//! `parking_lot::Mutex` behind an `Arc` so it can be shared and called from
//! multiple `rayon` workers, since `rusqlite::Connection` is `!Sync`.

mod schema;

use crate::domain::{
    Alert, Asset, AssetId, AssetKind, Batch, BatchId, BatchStatus, CalibrationFact,
    CalibrationPhase, CrossVerdict, InconsistencyStreak, Manifest, NonConformance,
    OperationalLimit, ParseStatus, ProductionFact, RawFile, RawFileId, ReconciliationVerdict,
    ReportShape, ReportType, StreakStatus, Verdict,
};
use crate::error::StoreError;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

type Result<T> = std::result::Result<T, StoreError>;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(schema::SCHEMA_SQL)?;
        info!(path = %path.display(), "store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // -- Asset -----------------------------------------------------------

    /// Upserts an asset by tag. §4.D: the first encounter seeds kind/bank/
    /// stream/riser; later encounters never silently overwrite — a mismatch
    /// is reported to the caller as `Ok(Some(warning))`.
    pub fn resolve_asset(&self, candidate: &Asset) -> Result<(AssetId, Option<String>)> {
        let conn = self.conn.lock();
        let existing: Option<(AssetId, String, Option<String>, Option<String>, Option<String>)> =
            conn.query_row(
                "SELECT id, kind, bank, stream, riser FROM assets WHERE tag = ?1",
                params![candidate.tag],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        if let Some((id, kind, bank, stream, riser)) = existing {
            let mut warning = None;
            if kind != candidate.kind.as_str() {
                warning = Some(format!(
                    "asset {} reported kind {} but is already {}",
                    candidate.tag,
                    candidate.kind.as_str(),
                    kind
                ));
            }
            let _ = (bank, stream, riser);
            return Ok((id, warning));
        }

        conn.execute(
            "INSERT INTO assets (tag, kind, bank, stream, riser) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                candidate.tag,
                candidate.kind.as_str(),
                candidate.bank,
                candidate.stream,
                candidate.riser
            ],
        )?;
        Ok((conn.last_insert_rowid(), None))
    }

    pub fn list_assets(&self) -> Result<Vec<Asset>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, tag, kind, bank, stream, riser FROM assets")?;
        let rows = stmt
            .query_map([], |row| {
                let kind_str: String = row.get(2)?;
                Ok(Asset {
                    id: row.get(0)?,
                    tag: row.get(1)?,
                    kind: AssetKind::from_str(&kind_str).unwrap_or(AssetKind::Mpfm),
                    bank: row.get(3)?,
                    stream: row.get(4)?,
                    riser: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- Batch -------------------------------------------------------------

    pub fn upsert_batch(&self, batch: &Batch) -> Result<BatchId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO batches (name, fingerprint, file_count, status) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(fingerprint) DO UPDATE SET file_count = excluded.file_count, status = excluded.status",
            params![batch.name, batch.fingerprint, batch.file_count, batch.status.as_str()],
        )?;
        conn.query_row(
            "SELECT id FROM batches WHERE fingerprint = ?1",
            params![batch.fingerprint],
            |row| row.get(0),
        )
        .map_err(StoreError::from)
    }

    pub fn set_batch_status(&self, batch_id: BatchId, status: BatchStatus) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE batches SET status = ?1 WHERE id = ?2",
            params![status.as_str(), batch_id],
        )?;
        Ok(())
    }

    // -- RawFile -----------------------------------------------------------

    /// §4.C step 2: upserts by fingerprint. Returns the row id and whether
    /// the caller won the race (`true`) or found an existing `SUCCESS` row
    /// it must short-circuit on (`false`), unless `force` is set.
    pub fn stage_raw_file(&self, file: &RawFile, force: bool) -> Result<(RawFileId, bool)> {
        let conn = self.conn.lock();
        let existing: Option<(RawFileId, String)> = conn
            .query_row(
                "SELECT id, parse_status FROM raw_files WHERE fingerprint = ?1",
                params![file.fingerprint],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((id, status)) = existing {
            let already_done = status == ParseStatus::Success.as_str();
            if already_done && !force {
                return Ok((id, false));
            }
            return Ok((id, true));
        }

        conn.execute(
            "INSERT INTO raw_files (filename, fingerprint, size_bytes, shape, parse_status, source_path, parent_batch)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                file.filename,
                file.fingerprint,
                file.size_bytes,
                file.shape.as_str(),
                file.parse_status.as_str(),
                file.source_path,
                file.parent_batch
            ],
        )?;
        Ok((conn.last_insert_rowid(), true))
    }

    pub fn finish_raw_file(
        &self,
        id: RawFileId,
        status: ParseStatus,
        record_count: u32,
        warnings: &[String],
        errors: &[String],
    ) -> Result<()> {
        let warnings_json = serde_json::to_string(warnings).unwrap_or_else(|_| "[]".to_string());
        let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string());
        self.conn.lock().execute(
            "UPDATE raw_files SET parse_status = ?1, record_count = ?2, warnings_json = ?3, errors_json = ?4 WHERE id = ?5",
            params![status.as_str(), record_count, warnings_json, errors_json, id],
        )?;
        Ok(())
    }

    // -- Manifest ------------------------------------------------------------

    pub fn upsert_manifest(&self, manifest: &Manifest) -> Result<()> {
        let flags_json = serde_json::to_string(
            &manifest
                .quality_flags
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".to_string());
        self.conn.lock().execute(
            "INSERT INTO manifests (batch_id, asset_id, business_date, expected_hourly, found_hourly, has_daily, has_calibration, quality_flags_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(batch_id, asset_id, business_date) DO UPDATE SET
                found_hourly = excluded.found_hourly,
                has_daily = excluded.has_daily,
                has_calibration = excluded.has_calibration,
                quality_flags_json = excluded.quality_flags_json",
            params![
                manifest.batch_id,
                manifest.asset_id,
                manifest.business_date.to_string(),
                manifest.expected_hourly,
                manifest.found_hourly,
                manifest.has_daily,
                manifest.has_calibration,
                flags_json
            ],
        )?;
        Ok(())
    }

    // -- ProductionFact ------------------------------------------------------

    /// §4.D: `INSERT OR REPLACE` on the natural key `(asset_tag, period_end,
    /// report_type)`.
    pub fn upsert_production_fact(&self, fact: &ProductionFact) -> Result<()> {
        let metrics_json = serde_json::to_string(&fact.metrics).map_err(json_err)?;
        let densities_json = serde_json::to_string(&fact.densities_kg_m3).map_err(json_err)?;
        let flags_json = serde_json::to_string(&fact.quality_flags).map_err(json_err)?;
        let period_detail_json = serde_json::to_string(&fact.period_detail).map_err(json_err)?;
        self.conn.lock().execute(
            "INSERT INTO production_facts
                (asset_id, asset_tag, report_type, period_start, period_end, business_date,
                 metrics_json, average_pressure_kpa, average_temperature_c, bsw_pct, densities_json,
                 quality_flags_json, source_raw_file, period_detail_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(asset_tag, period_end, report_type) DO UPDATE SET
                asset_id = excluded.asset_id,
                period_start = excluded.period_start,
                business_date = excluded.business_date,
                metrics_json = excluded.metrics_json,
                average_pressure_kpa = excluded.average_pressure_kpa,
                average_temperature_c = excluded.average_temperature_c,
                bsw_pct = excluded.bsw_pct,
                densities_json = excluded.densities_json,
                quality_flags_json = excluded.quality_flags_json,
                source_raw_file = excluded.source_raw_file,
                period_detail_json = excluded.period_detail_json",
            params![
                fact.asset_id,
                fact.asset_tag,
                fact.report_type.as_str(),
                fact.period_start.to_string(),
                fact.period_end.to_string(),
                fact.business_date.to_string(),
                metrics_json,
                fact.average_pressure_kpa,
                fact.average_temperature_c,
                fact.bsw_pct,
                densities_json,
                flags_json,
                fact.source_raw_file,
                period_detail_json
            ],
        )?;
        Ok(())
    }

    /// Returns (daily fact if present, all hourly facts) for (asset, date),
    /// the read the Reconciler builds each metric verdict from (§4.E).
    pub fn facts_for_business_date(
        &self,
        asset_id: AssetId,
        business_date: NaiveDate,
    ) -> Result<(Option<ProductionFact>, Vec<ProductionFact>)> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT asset_id, asset_tag, report_type, period_start, period_end, business_date,
                    metrics_json, average_pressure_kpa, average_temperature_c, bsw_pct, densities_json,
                    quality_flags_json, source_raw_file, period_detail_json
             FROM production_facts WHERE asset_id = ?1 AND business_date = ?2",
        )?;
        let rows = stmt
            .query_map(params![asset_id, business_date.to_string()], row_to_fact)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut daily = None;
        let mut hourlies = Vec::new();
        for fact in rows {
            match fact.report_type {
                ReportType::Daily => daily = Some(fact),
                ReportType::Hourly => hourlies.push(fact),
            }
        }
        Ok((daily, hourlies))
    }

    pub fn active_asset_ids(&self) -> Result<Vec<AssetId>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id FROM assets")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- CalibrationFact -------------------------------------------------------

    pub fn upsert_calibration_fact(&self, fact: &CalibrationFact) -> Result<()> {
        let used = serde_json::to_string(&phase_map_to_string(&fact.used_k_factor)).map_err(json_err)?;
        let new = serde_json::to_string(&phase_map_to_string(&fact.new_k_factor)).map_err(json_err)?;
        let dens_m = serde_json::to_string(&phase_map_to_string(&fact.densities_mpfm_kg_m3)).map_err(json_err)?;
        let dens_s = serde_json::to_string(&phase_map_to_string(&fact.densities_separator_kg_m3)).map_err(json_err)?;
        let mass_m = serde_json::to_string(&phase_map_to_string(&fact.accumulated_mass_mpfm_t)).map_err(json_err)?;
        let mass_s = serde_json::to_string(&phase_map_to_string(&fact.accumulated_mass_separator_t)).map_err(json_err)?;
        let flags = serde_json::to_string(&fact.flags).map_err(json_err)?;
        self.conn.lock().execute(
            "INSERT INTO calibration_facts
                (asset_id, asset_tag, calibration_no, selected_mpfm, window_start, window_end, status,
                 used_k_factor_json, new_k_factor_json, average_pressure_mpfm_kpa,
                 average_pressure_separator_kpa, average_temperature_mpfm_c,
                 average_temperature_separator_c, densities_mpfm_json, densities_separator_json,
                 accumulated_mass_mpfm_json, accumulated_mass_separator_json, flags_json)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
             ON CONFLICT(asset_tag, calibration_no) DO UPDATE SET
                selected_mpfm = excluded.selected_mpfm,
                window_start = excluded.window_start,
                window_end = excluded.window_end,
                status = excluded.status,
                used_k_factor_json = excluded.used_k_factor_json,
                new_k_factor_json = excluded.new_k_factor_json,
                flags_json = excluded.flags_json",
            params![
                fact.asset_id, fact.asset_tag, fact.calibration_no, fact.selected_mpfm,
                fact.window_start.to_string(), fact.window_end.to_string(), fact.status.as_str(),
                used, new, fact.average_pressure_mpfm_kpa, fact.average_pressure_separator_kpa,
                fact.average_temperature_mpfm_c, fact.average_temperature_separator_c,
                dens_m, dens_s, mass_m, mass_s, flags
            ],
        )?;
        Ok(())
    }

    // -- FlowComputerFact --------------------------------------------------------

    pub fn upsert_flow_computer_config(&self, fact: &crate::domain::FlowComputerFact) -> Result<()> {
        let meter_factors_json = serde_json::to_string(&fact.meter_factors).map_err(json_err)?;
        let pressure_json = serde_json::to_string(&fact.pressure_instruments).map_err(json_err)?;
        let temperature_json = serde_json::to_string(&fact.temperature_instruments).map_err(json_err)?;
        self.conn.lock().execute(
            "INSERT INTO flow_computer_configs
                (asset_id, asset_tag, serial, collected_at, ambient_temperature_c,
                 ambient_pressure_kpa, reference_temperature_c, reference_pressure_kpa,
                 software_version, meter_factors_json, pressure_instruments_json,
                 temperature_instruments_json)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)
             ON CONFLICT(asset_tag, collected_at) DO UPDATE SET
                serial = excluded.serial,
                ambient_temperature_c = excluded.ambient_temperature_c,
                ambient_pressure_kpa = excluded.ambient_pressure_kpa,
                reference_temperature_c = excluded.reference_temperature_c,
                reference_pressure_kpa = excluded.reference_pressure_kpa,
                software_version = excluded.software_version,
                meter_factors_json = excluded.meter_factors_json,
                pressure_instruments_json = excluded.pressure_instruments_json,
                temperature_instruments_json = excluded.temperature_instruments_json",
            params![
                fact.asset_id,
                fact.asset_tag,
                fact.serial,
                fact.collected_at.map(|t| t.to_string()),
                fact.ambient_temperature_c,
                fact.ambient_pressure_kpa,
                fact.reference_temperature_c,
                fact.reference_pressure_kpa,
                fact.software_version,
                meter_factors_json,
                pressure_json,
                temperature_json,
            ],
        )?;
        Ok(())
    }

    // -- ReconciliationVerdict -------------------------------------------------

    /// §4.E: deletes prior verdicts for the (asset, date) key before
    /// inserting the freshly computed set, so a re-run never leaves stale
    /// rows shadowing the new ones.
    pub fn replace_reconciliation_verdicts(
        &self,
        asset_id: AssetId,
        business_date: NaiveDate,
        verdicts: &[ReconciliationVerdict],
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM reconciliation_verdicts WHERE asset_id = ?1 AND business_date = ?2",
            params![asset_id, business_date.to_string()],
        )?;
        for v in verdicts {
            tx.execute(
                "INSERT INTO reconciliation_verdicts
                    (asset_id, business_date, metric_key, hourly_sum, daily_value,
                     absolute_diff, relative_diff_pct, verdict, hourly_count)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
                params![
                    v.asset_id, v.business_date.to_string(), v.metric_key, v.hourly_sum,
                    v.daily_value, v.absolute_diff, v.relative_diff_pct, v.verdict.as_str(),
                    v.hourly_count
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn reconciliation_verdicts_for(
        &self,
        asset_id: AssetId,
        business_date: NaiveDate,
    ) -> Result<Vec<ReconciliationVerdict>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT asset_id, business_date, metric_key, hourly_sum, daily_value,
                    absolute_diff, relative_diff_pct, verdict, hourly_count
             FROM reconciliation_verdicts WHERE asset_id = ?1 AND business_date = ?2",
        )?;
        let rows = stmt
            .query_map(params![asset_id, business_date.to_string()], |row| {
                let verdict_str: String = row.get(7)?;
                let date_str: String = row.get(1)?;
                Ok(ReconciliationVerdict {
                    id: None,
                    asset_id: row.get(0)?,
                    business_date: date_str.parse().unwrap_or(business_date),
                    metric_key: row.get(2)?,
                    hourly_sum: row.get(3)?,
                    daily_value: row.get(4)?,
                    absolute_diff: row.get(5)?,
                    relative_diff_pct: row.get(6)?,
                    verdict: verdict_from_str(&verdict_str),
                    hourly_count: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- Source observations (§4.F raw per-shape readings) -----------------

    /// Records one shape's reading of a metric, keyed by `(asset,
    /// business_date, time_window, metric, source_class)`. The
    /// Cross-validator reads these back grouped by source class to build
    /// the [`crate::domain::SourceValues`] it classifies (§4.F) — the
    /// canonical `production_facts` row above is the merged, last-write-wins
    /// view the Reconciler and presentation layer read.
    pub fn upsert_source_observation(
        &self,
        asset_id: AssetId,
        business_date: NaiveDate,
        time_window: &str,
        metric_key: &str,
        source_class: crate::domain::SourceClass,
        value: f64,
    ) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO source_observations
                (asset_id, business_date, time_window, metric_key, source_class, value)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(asset_id, business_date, time_window, metric_key, source_class)
                DO UPDATE SET value = excluded.value",
            params![
                asset_id,
                business_date.to_string(),
                time_window,
                metric_key,
                source_class.as_str(),
                value
            ],
        )?;
        Ok(())
    }

    pub fn source_values_for(
        &self,
        asset_id: AssetId,
        business_date: NaiveDate,
        time_window: &str,
        metric_key: &str,
    ) -> Result<crate::domain::SourceValues> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT source_class, value FROM source_observations
             WHERE asset_id = ?1 AND business_date = ?2 AND time_window = ?3 AND metric_key = ?4",
        )?;
        let rows = stmt
            .query_map(
                params![asset_id, business_date.to_string(), time_window, metric_key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut values = crate::domain::SourceValues::default();
        for (class, value) in rows {
            match class.as_str() {
                "spreadsheet" => values.spreadsheet = Some(value),
                "xml" => values.xml = Some(value),
                "pdf" => values.pdf = Some(value),
                "txt" => values.txt = Some(value),
                _ => {}
            }
        }
        Ok(values)
    }

    // -- CrossVerdict & streaks -------------------------------------------------

    pub fn upsert_cross_verdict(&self, verdict: &CrossVerdict) -> Result<()> {
        let values_json = serde_json::to_string(&verdict.values).map_err(json_err)?;
        self.conn.lock().execute(
            "INSERT INTO cross_verdicts
                (asset_id, business_date, time_window, metric_key, values_json,
                 max_absolute_deviation, max_relative_deviation_pct, applied_tolerance, classification)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
             ON CONFLICT(asset_id, business_date, time_window, metric_key) DO UPDATE SET
                values_json = excluded.values_json,
                max_absolute_deviation = excluded.max_absolute_deviation,
                max_relative_deviation_pct = excluded.max_relative_deviation_pct,
                applied_tolerance = excluded.applied_tolerance,
                classification = excluded.classification",
            params![
                verdict.asset_id, verdict.business_date.to_string(), verdict.time_window,
                verdict.metric_key, values_json, verdict.max_absolute_deviation,
                verdict.max_relative_deviation_pct, verdict.applied_tolerance,
                verdict.classification.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn get_streak(&self, asset_id: AssetId, metric_key: &str) -> Result<Option<InconsistencyStreak>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT asset_id, metric_key, status, first_occurrence, last_occurrence, consecutive_days
             FROM inconsistency_streaks WHERE asset_id = ?1 AND metric_key = ?2",
            params![asset_id, metric_key],
            |row| {
                let status: String = row.get(2)?;
                let first: String = row.get(3)?;
                let last: String = row.get(4)?;
                Ok(InconsistencyStreak {
                    id: None,
                    asset_id: row.get(0)?,
                    metric_key: row.get(1)?,
                    status: streak_status_from_str(&status),
                    first_occurrence: first.parse().unwrap(),
                    last_occurrence: last.parse().unwrap(),
                    consecutive_days: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn upsert_streak(&self, streak: &InconsistencyStreak) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO inconsistency_streaks
                (asset_id, metric_key, status, first_occurrence, last_occurrence, consecutive_days)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(asset_id, metric_key) DO UPDATE SET
                status = excluded.status,
                first_occurrence = excluded.first_occurrence,
                last_occurrence = excluded.last_occurrence,
                consecutive_days = excluded.consecutive_days",
            params![
                streak.asset_id, streak.metric_key, streak.status.as_str(),
                streak.first_occurrence.to_string(), streak.last_occurrence.to_string(),
                streak.consecutive_days
            ],
        )?;
        Ok(())
    }

    /// Idempotent under re-runs: the event id is deterministic (§4.F).
    pub fn insert_non_conformance_if_absent(&self, nc: &NonConformance) -> Result<bool> {
        let conn = self.conn.lock();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM non_conformances WHERE event_id = ?1",
                params![nc.event_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Ok(false);
        }
        conn.execute(
            "INSERT INTO non_conformances
                (event_id, asset_id, metric_key, occurrence_date, detected_at,
                 deviation_description, partial_deadline, final_deadline)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                nc.event_id, nc.asset_id, nc.metric_key, nc.occurrence_date.to_string(),
                nc.detected_at.to_string(), nc.deviation_description,
                nc.partial_deadline.map(|d| d.to_string()),
                nc.final_deadline.map(|d| d.to_string())
            ],
        )?;
        Ok(true)
    }

    pub fn count_non_conformances_for(&self, asset_id: AssetId, metric_key: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM non_conformances WHERE asset_id = ?1 AND metric_key = ?2",
            params![asset_id, metric_key],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // -- OperationalLimit & Alert -------------------------------------------------

    pub fn seed_operational_limit(&self, limit: &OperationalLimit) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO operational_limits (parameter, warning, critical, unit, description, active)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(parameter) DO NOTHING",
            params![
                limit.parameter, limit.warning, limit.critical, limit.unit, limit.description,
                limit.active
            ],
        )?;
        Ok(())
    }

    pub fn get_operational_limit(&self, parameter: &str) -> Result<Option<OperationalLimit>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT parameter, warning, critical, unit, description, active FROM operational_limits WHERE parameter = ?1",
            params![parameter],
            |row| {
                Ok(OperationalLimit {
                    parameter: row.get(0)?,
                    warning: row.get(1)?,
                    critical: row.get(2)?,
                    unit: row.get(3)?,
                    description: row.get(4)?,
                    active: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn insert_alert(&self, alert: &Alert) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO alerts
                (alert_type, severity, parameter, current_value, limit_value, unit, message,
                 asset_id, business_date, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                alert.alert_type.as_str(), alert.severity.as_str(), alert.parameter,
                alert.current_value, alert.limit_value, alert.unit, alert.message,
                alert.asset_id, alert.business_date.to_string(), alert.created_at.to_string()
            ],
        )?;
        Ok(())
    }

    /// Count of alerts by severity over a trailing window, the pure `Store`
    /// read the out-of-scope presentation layer would render (§4.H).
    pub fn alert_summary_since(&self, since: NaiveDate) -> Result<Vec<(String, String, i64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT alert_type, severity, COUNT(*) FROM alerts WHERE business_date >= ?1
             GROUP BY alert_type, severity",
        )?;
        let rows = stmt
            .query_map(params![since.to_string()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn json_err(e: serde_json::Error) -> StoreError {
    StoreError::Integrity(e.to_string())
}

fn phase_map_to_string(map: &BTreeMap<CalibrationPhase, f64>) -> BTreeMap<String, f64> {
    map.iter().map(|(k, v)| (k.code().to_string(), *v)).collect()
}

fn verdict_from_str(s: &str) -> Verdict {
    match s {
        "PASS" => Verdict::Pass,
        "WARN" => Verdict::Warn,
        "FAIL" => Verdict::Fail,
        "MISSING_DAILY" => Verdict::MissingDaily,
        _ => Verdict::MissingHourly,
    }
}

fn streak_status_from_str(s: &str) -> StreakStatus {
    match s {
        "ACTIVE" => StreakStatus::Active,
        "ESCALATED" => StreakStatus::Escalated,
        _ => StreakStatus::Resolved,
    }
}

fn row_to_fact(row: &rusqlite::Row) -> rusqlite::Result<ProductionFact> {
    let report_type_str: String = row.get(2)?;
    let period_start: String = row.get(3)?;
    let period_end: String = row.get(4)?;
    let business_date: String = row.get(5)?;
    let metrics_json: String = row.get(6)?;
    let densities_json: String = row.get(10)?;
    let flags_json: String = row.get(11)?;
    let period_detail_json: String = row.get(13)?;
    Ok(ProductionFact {
        id: None,
        asset_id: row.get(0)?,
        asset_tag: row.get(1)?,
        report_type: ReportType::from_str(&report_type_str).unwrap_or(ReportType::Hourly),
        period_start: period_start.parse().unwrap(),
        period_end: period_end.parse().unwrap(),
        business_date: business_date.parse().unwrap(),
        metrics: serde_json::from_str(&metrics_json).unwrap_or_default(),
        average_pressure_kpa: row.get(7)?,
        average_temperature_c: row.get(8)?,
        bsw_pct: row.get(9)?,
        densities_kg_m3: serde_json::from_str(&densities_json).unwrap_or_default(),
        quality_flags: serde_json::from_str(&flags_json).unwrap_or_default(),
        source_raw_file: row.get(12)?,
        period_detail: serde_json::from_str(&period_detail_json).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssetKind;

    #[test]
    fn resolve_asset_seeds_then_preserves_dimensions() {
        let store = Store::open_in_memory().unwrap();
        let mut asset = Asset::new("13FT0367", AssetKind::Mpfm);
        asset.bank = Some("B01".to_string());
        let (id1, warn1) = store.resolve_asset(&asset).unwrap();
        assert!(warn1.is_none());

        let mut conflicting = Asset::new("13FT0367", AssetKind::Topside);
        let (id2, warn2) = store.resolve_asset(&conflicting).unwrap();
        assert_eq!(id1, id2);
        assert!(warn2.is_some());
        let _ = &mut conflicting;
    }

    #[test]
    fn stage_raw_file_short_circuits_on_success() {
        let store = Store::open_in_memory().unwrap();
        let file = RawFile::pending(
            "f.xlsx".to_string(),
            "fp1".to_string(),
            10,
            ReportShape::SpreadsheetDailyOil,
            "/tmp/f.xlsx".to_string(),
            None,
        );
        let (id, is_new) = store.stage_raw_file(&file, false).unwrap();
        assert!(is_new);
        store
            .finish_raw_file(id, ParseStatus::Success, 5, &[], &[])
            .unwrap();
        let (id2, should_parse) = store.stage_raw_file(&file, false).unwrap();
        assert_eq!(id, id2);
        assert!(!should_parse);
    }
}
