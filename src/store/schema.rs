//! Schema definition, created idempotently at startup (§4.G), following the
//! teacher's `SCHEMA_SQL` constant + `PRAGMA journal_mode = WAL` convention.

pub const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS assets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    bank TEXT,
    stream TEXT,
    riser TEXT
);

CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    fingerprint TEXT NOT NULL UNIQUE,
    file_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS raw_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    fingerprint TEXT NOT NULL UNIQUE,
    size_bytes INTEGER NOT NULL,
    shape TEXT NOT NULL,
    parse_status TEXT NOT NULL,
    source_path TEXT NOT NULL,
    parent_batch INTEGER REFERENCES batches(id),
    record_count INTEGER NOT NULL DEFAULT 0,
    warnings_json TEXT NOT NULL DEFAULT '[]',
    errors_json TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS manifests (
    batch_id INTEGER NOT NULL REFERENCES batches(id),
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    business_date TEXT NOT NULL,
    expected_hourly INTEGER NOT NULL DEFAULT 24,
    found_hourly INTEGER NOT NULL DEFAULT 0,
    has_daily INTEGER NOT NULL DEFAULT 0,
    has_calibration INTEGER NOT NULL DEFAULT 0,
    quality_flags_json TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (batch_id, asset_id, business_date)
);

CREATE TABLE IF NOT EXISTS production_facts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    asset_tag TEXT NOT NULL,
    report_type TEXT NOT NULL,
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL,
    business_date TEXT NOT NULL,
    metrics_json TEXT NOT NULL,
    average_pressure_kpa REAL,
    average_temperature_c REAL,
    bsw_pct REAL,
    densities_json TEXT NOT NULL DEFAULT '{}',
    quality_flags_json TEXT NOT NULL DEFAULT '[]',
    source_raw_file INTEGER NOT NULL REFERENCES raw_files(id),
    period_detail_json TEXT NOT NULL DEFAULT '{}',
    UNIQUE(asset_tag, period_end, report_type)
);

CREATE INDEX IF NOT EXISTS idx_production_facts_date
    ON production_facts(asset_id, business_date, report_type);

CREATE TABLE IF NOT EXISTS calibration_facts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    asset_tag TEXT NOT NULL,
    calibration_no TEXT NOT NULL,
    selected_mpfm TEXT,
    window_start TEXT NOT NULL,
    window_end TEXT NOT NULL,
    status TEXT NOT NULL,
    used_k_factor_json TEXT NOT NULL DEFAULT '{}',
    new_k_factor_json TEXT NOT NULL DEFAULT '{}',
    average_pressure_mpfm_kpa REAL,
    average_pressure_separator_kpa REAL,
    average_temperature_mpfm_c REAL,
    average_temperature_separator_c REAL,
    densities_mpfm_json TEXT NOT NULL DEFAULT '{}',
    densities_separator_json TEXT NOT NULL DEFAULT '{}',
    accumulated_mass_mpfm_json TEXT NOT NULL DEFAULT '{}',
    accumulated_mass_separator_json TEXT NOT NULL DEFAULT '{}',
    flags_json TEXT NOT NULL DEFAULT '[]',
    UNIQUE(asset_tag, calibration_no)
);

CREATE TABLE IF NOT EXISTS flow_computer_configs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    asset_tag TEXT NOT NULL,
    serial TEXT,
    collected_at TEXT,
    ambient_temperature_c REAL,
    ambient_pressure_kpa REAL,
    reference_temperature_c REAL,
    reference_pressure_kpa REAL,
    software_version TEXT,
    meter_factors_json TEXT NOT NULL DEFAULT '[]',
    pressure_instruments_json TEXT NOT NULL DEFAULT '[]',
    temperature_instruments_json TEXT NOT NULL DEFAULT '[]',
    UNIQUE(asset_tag, collected_at)
);

CREATE TABLE IF NOT EXISTS reconciliation_verdicts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    business_date TEXT NOT NULL,
    metric_key TEXT NOT NULL,
    hourly_sum REAL,
    daily_value REAL,
    absolute_diff REAL,
    relative_diff_pct REAL,
    verdict TEXT NOT NULL,
    hourly_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(asset_id, business_date, metric_key)
);

CREATE TABLE IF NOT EXISTS source_observations (
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    business_date TEXT NOT NULL,
    time_window TEXT NOT NULL,
    metric_key TEXT NOT NULL,
    source_class TEXT NOT NULL,
    value REAL NOT NULL,
    PRIMARY KEY (asset_id, business_date, time_window, metric_key, source_class)
);

CREATE TABLE IF NOT EXISTS cross_verdicts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    business_date TEXT NOT NULL,
    time_window TEXT NOT NULL,
    metric_key TEXT NOT NULL,
    values_json TEXT NOT NULL,
    max_absolute_deviation REAL,
    max_relative_deviation_pct REAL,
    applied_tolerance REAL,
    classification TEXT NOT NULL,
    UNIQUE(asset_id, business_date, time_window, metric_key)
);

CREATE TABLE IF NOT EXISTS inconsistency_streaks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    metric_key TEXT NOT NULL,
    status TEXT NOT NULL,
    first_occurrence TEXT NOT NULL,
    last_occurrence TEXT NOT NULL,
    consecutive_days INTEGER NOT NULL,
    UNIQUE(asset_id, metric_key)
);

CREATE TABLE IF NOT EXISTS non_conformances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL UNIQUE,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    metric_key TEXT NOT NULL,
    occurrence_date TEXT NOT NULL,
    detected_at TEXT NOT NULL,
    deviation_description TEXT NOT NULL,
    partial_deadline TEXT,
    final_deadline TEXT
);

CREATE TABLE IF NOT EXISTS operational_limits (
    parameter TEXT PRIMARY KEY,
    warning REAL NOT NULL,
    critical REAL NOT NULL,
    unit TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    parameter TEXT NOT NULL,
    current_value REAL NOT NULL,
    limit_value REAL NOT NULL,
    unit TEXT NOT NULL,
    message TEXT NOT NULL,
    asset_id INTEGER REFERENCES assets(id),
    business_date TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_alerts_date ON alerts(business_date, severity);
"#;
