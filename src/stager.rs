//! Fingerprints files, deduplicates, and coordinates per-batch manifests
//! (§4.C). Safe to call from multiple `rayon` workers: uniqueness is
//! enforced by the store's `UNIQUE(fingerprint)` constraint, so the loser
//! of a race simply observes the existing row.

use crate::domain::{Batch, Manifest, RawFile, RawFileId, ReportShape};
use crate::error::StageError;
use crate::store::Store;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};

pub struct StageResult {
    pub raw_file_id: RawFileId,
    pub should_parse: bool,
}

pub fn fingerprint_file(path: &Path) -> Result<String, StageError> {
    let bytes = std::fs::read(path).map_err(|source| StageError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// §4.C contract: `stage(file) -> RawFileRef`. Hashes, upserts by
/// fingerprint, and returns whether the caller should proceed to parse.
pub fn stage(
    store: &Store,
    path: &Path,
    shape: ReportShape,
    parent_batch: Option<crate::domain::BatchId>,
    force: bool,
) -> Result<StageResult, StageError> {
    let fingerprint = fingerprint_file(path)?;
    let size_bytes = std::fs::metadata(path)
        .map_err(|source| StageError::Io {
            path: path.display().to_string(),
            source,
        })?
        .len();
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let candidate = RawFile::pending(
        filename,
        fingerprint,
        size_bytes,
        shape,
        path.display().to_string(),
        parent_batch,
    );

    let (raw_file_id, should_parse) = store.stage_raw_file(&candidate, force)?;
    if !should_parse {
        info!(path = %path.display(), "raw file already staged, skipping re-parse");
    }
    Ok(StageResult {
        raw_file_id,
        should_parse,
    })
}

/// Registers (or updates) the owning batch row for an archive submission.
pub fn stage_batch(store: &Store, name: &str, fingerprint: &str, file_count: u32) -> Result<crate::domain::BatchId, StageError> {
    let mut batch = Batch::new(name.to_string(), fingerprint.to_string());
    batch.file_count = file_count;
    store.upsert_batch(&batch).map_err(StageError::from)
}

/// Recomputes and persists the (batch, asset, business-date) manifest
/// counters after a file finishes parsing (§4.C step 3).
pub fn record_manifest_progress(
    store: &Store,
    mut manifest: Manifest,
) -> Result<(), StageError> {
    manifest.recompute_flags();
    if manifest.quality_flags.iter().any(|f| {
        matches!(f, crate::domain::QualityFlag::BatchIncomplete)
    }) {
        warn!(
            asset_id = manifest.asset_id,
            date = %manifest.business_date,
            "manifest incomplete: fewer hourly reports than expected"
        );
    }
    store.upsert_manifest(&manifest).map_err(StageError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let mut file_a = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file_a, b"hello").unwrap();
        let mut file_b = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file_b, b"hello").unwrap();
        let mut file_c = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file_c, b"world").unwrap();

        let fp_a = fingerprint_file(file_a.path()).unwrap();
        let fp_b = fingerprint_file(file_b.path()).unwrap();
        let fp_c = fingerprint_file(file_c.path()).unwrap();

        assert_eq!(fp_a, fp_b);
        assert_ne!(fp_a, fp_c);
    }

    #[test]
    fn idempotent_staging_returns_same_id() {
        let store = Store::open_in_memory().unwrap();
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"content").unwrap();

        let first = stage(&store, file.path(), ReportShape::SpreadsheetDailyOil, None, false).unwrap();
        assert!(first.should_parse);
        store
            .finish_raw_file(first.raw_file_id, crate::domain::ParseStatus::Success, 1, &[], &[])
            .unwrap();

        let second = stage(&store, file.path(), ReportShape::SpreadsheetDailyOil, None, false).unwrap();
        assert_eq!(first.raw_file_id, second.raw_file_id);
        assert!(!second.should_parse);
    }
}
