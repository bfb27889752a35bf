//! CLI entry point: loads configuration, opens the store, and dispatches
//! to the ingestion pipeline or the individual reconciliation/cross-
//! validation stages for ad-hoc re-runs (§4.I, §6).
//!
//! Exit codes: `0` success, `1` configuration error, `2` partial failure
//! (some files/pairs failed but the run completed), `3` fatal error.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use sgm_fm::config::Config;
use sgm_fm::domain::{AssetId, OperationalLimit as DomainOperationalLimit};
use sgm_fm::store::Store;
use sgm_fm::{cross_validator, pipeline, reconciler};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sgm-fm", about = "Fiscal MPFM ingestion and reconciliation engine")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingests every file under `path`, then reconciles, cross-validates
    /// and runs the daily analyzer over every pair it touched.
    Ingest { path: PathBuf },
    /// Re-runs reconciliation (§4.E) over a date range without re-parsing
    /// any files.
    Reconcile {
        #[arg(long)]
        asset: Option<String>,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Re-runs cross-validation (§4.F) over a date range without
    /// re-parsing any files.
    CrossValidate {
        #[arg(long)]
        asset: Option<String>,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Prints open non-conformances and a recent alert summary.
    Status {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

fn init_tracing(cfg: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("sgm_fm={}", cfg.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if cfg.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn seed_operational_limits(store: &Store, cfg: &Config) -> Result<()> {
    for (parameter, limit) in &cfg.operational_limits {
        store.seed_operational_limit(&DomainOperationalLimit {
            parameter: parameter.clone(),
            warning: limit.warning,
            critical: limit.critical,
            unit: "%".to_string(),
            description: String::new(),
            active: true,
        })?;
    }
    Ok(())
}

fn resolve_asset_ids(store: &Store, tag: Option<&str>) -> Result<Vec<AssetId>> {
    let assets = store.list_assets()?;
    Ok(assets
        .into_iter()
        .filter(|a| tag.map_or(true, |t| a.tag == t))
        .filter_map(|a| a.id)
        .collect())
}

fn date_range(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut cursor = from;
    while cursor <= to {
        dates.push(cursor);
        cursor += chrono::Duration::days(1);
    }
    dates
}

fn run() -> Result<ExitCode> {
    let _ = dotenv();
    let cli = Cli::parse();
    let cfg = match Config::load(cli.config.as_deref()).context("loading configuration") {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return Ok(ExitCode::from(1));
        }
    };
    init_tracing(&cfg);

    let store = Store::open(&cfg.database_path)
        .with_context(|| format!("opening store at {}", cfg.database_path.display()))?;
    seed_operational_limits(&store, &cfg)?;

    match cli.command {
        Command::Ingest { path } => {
            let report = pipeline::ingest(&store, &cfg, &path)?;
            info!(
                seen = report.files_seen,
                parsed = report.files_parsed,
                failed = report.files_failed,
                affected = report.affected.len(),
                "ingest complete"
            );

            let mut analysis_failed = 0u32;
            for (asset_id, business_date) in &report.affected {
                if let Err(e) = pipeline::analyze_affected(&store, &cfg, *asset_id, *business_date) {
                    error!(asset_id, %business_date, error = %e, "analysis failed");
                    analysis_failed += 1;
                }
            }
            for (business_date, rows) in &report.gas_balance_by_date {
                if let Err(e) = pipeline::analyze_gas_balance(&store, *business_date, rows) {
                    error!(%business_date, error = %e, "gas balance analysis failed");
                    analysis_failed += 1;
                }
            }
            match pipeline::sweep_missing_data(&store, &report) {
                Ok(alerts) if !alerts.is_empty() => {
                    info!(count = alerts.len(), "missing-data sweep raised alerts");
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "missing-data sweep failed");
                    analysis_failed += 1;
                }
            }

            if report.files_failed > 0 || analysis_failed > 0 {
                warn!(
                    files_failed = report.files_failed,
                    analysis_failed, "ingest completed with partial failures"
                );
                return Ok(ExitCode::from(2));
            }
        }
        Command::Reconcile { asset, from, to } => {
            let asset_ids = resolve_asset_ids(&store, asset.as_deref())?;
            for asset_id in asset_ids {
                for business_date in date_range(from, to) {
                    let verdicts = reconciler::reconcile(&store, asset_id, business_date, &cfg.reconciliation)?;
                    if let Some(overall) = reconciler::overall_status(&verdicts) {
                        info!(asset_id, %business_date, verdict = overall.as_str(), "reconciled");
                    }
                }
            }
        }
        Command::CrossValidate { asset, from, to } => {
            let asset_ids = resolve_asset_ids(&store, asset.as_deref())?;
            for asset_id in asset_ids {
                for business_date in date_range(from, to) {
                    for (bank, _phase, metric_key) in sgm_fm::domain::all_metric_keys() {
                        for time_window in ["hourly", "daily"] {
                            let values = store.source_values_for(asset_id, business_date, time_window, &metric_key)?;
                            if values.present().is_empty() {
                                continue;
                            }
                            let verdict = cross_validator::classify(
                                asset_id,
                                business_date,
                                time_window,
                                &metric_key,
                                values,
                                &cfg.cross_validation,
                                bank.tolerance_class(),
                            );
                            store.upsert_cross_verdict(&verdict)?;
                            cross_validator::update_streak(
                                &store,
                                asset_id,
                                &metric_key,
                                business_date,
                                verdict.classification,
                                cfg.cross_validation.escalation_days,
                            )?;
                        }
                    }
                }
            }
        }
        Command::Status { days } => {
            let since = chrono::Utc::now().date_naive() - chrono::Duration::days(days);
            let summary = store.alert_summary_since(since)?;
            if summary.is_empty() {
                println!("no alerts since {since}");
            }
            for (alert_type, severity, count) in summary {
                println!("{alert_type:<24} {severity:<10} {count}");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal error: {e:#}");
            ExitCode::from(3)
        }
    }
}
