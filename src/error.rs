//! Error taxonomy for the ingestion-and-reconciliation core.
//!
//! Every component gets its own narrow error enum so that callers can match
//! on the failure mode that matters to them; `PipelineError` composes them
//! at the stage-orchestration boundary. `main` converts everything to
//! `anyhow::Error` at the CLI boundary, the way the teacher's `main.rs` does.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("could not read content sample from {path}: {source}")]
    Sniff {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{shape:?}: unreadable file {path}: {reason}")]
    Structural {
        shape: crate::domain::ReportShape,
        path: String,
        reason: String,
    },
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("archive error in {path}: {reason}")]
    Archive { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("io error hashing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("store error during staging: {0}")]
    Store(#[from] StoreError),
    #[error("batch cancelled")]
    Cancelled,
    #[error("file parse exceeded timeout of {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum CanonError {
    #[error("store error during canonicalization: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store error during reconciliation: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum CrossValidateError {
    #[error("store error during cross-validation: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("store error during daily analysis: {0}")]
    Store(#[from] StoreError),
}

/// Store-layer failures. Unique-key collisions are modeled as `Ok` (idempotent
/// upsert) everywhere in this crate; `StoreError` is reserved for failures a
/// caller cannot treat as "already there" — foreign-key violations, pool
/// exhaustion, or the underlying `rusqlite` error surface.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("referential integrity violation: {0}")]
    Integrity(String),
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Canon(#[from] CanonError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    CrossValidate(#[from] CrossValidateError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("configuration error: {0}")]
    Config(String),
}
