//! Fiscal MPFM ingestion, reconciliation and cross-validation engine.
//!
//! Exposes the pipeline stages as a library so the CLI binary and the test
//! suite share one implementation.

pub mod analyzer;
pub mod canonicalizer;
pub mod classifier;
pub mod config;
pub mod cross_validator;
pub mod domain;
pub mod error;
pub mod parsers;
pub mod pipeline;
pub mod reconciler;
pub mod stager;
pub mod store;

pub use config::Config;
pub use error::PipelineError;
pub use store::Store;
