//! Batch archive parser (§4.B.4). Expands a zip-family archive into a
//! scoped temporary directory and hands each member back to the pipeline
//! with a batch reference; rejects path traversal and hidden entries and
//! caps total uncompressed size.

use super::{ParseOutcome, ParserRecord};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MAX_UNCOMPRESSED_BYTES: u64 = 2 * 1024 * 1024 * 1024;

fn is_hidden(name: &str) -> bool {
    name.split('/')
        .last()
        .map(|leaf| leaf.starts_with('.') || leaf == "__MACOSX")
        .unwrap_or(false)
}

fn is_safe_path(name: &str) -> bool {
    !Path::new(name)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
}

/// Extracts `path` into a fresh scoped directory; the returned `TempDir`
/// must be kept alive by the caller for the batch's lifetime and is
/// removed on drop regardless of exit path (§5 "temporary extraction
/// lifetime").
pub fn parse_archive(path: &Path) -> std::io::Result<(TempDir, ParseOutcome)> {
    let dir = TempDir::new()?;
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => return Ok((dir, ParseOutcome::failed(format!("cannot open archive: {e}")))),
    };
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(a) => a,
        Err(e) => return Ok((dir, ParseOutcome::failed(format!("cannot read archive: {e}")))),
    };

    let mut records = Vec::new();
    let mut warnings = Vec::new();
    let mut total_bytes: u64 = 0;

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(e) => e,
            Err(e) => {
                warnings.push(format!("archive entry {i} unreadable: {e}"));
                continue;
            }
        };
        let name = entry.name().to_string();
        if entry.is_dir() {
            continue;
        }
        if is_hidden(&name) {
            warnings.push(format!("skipped hidden entry: {name}"));
            continue;
        }
        if !is_safe_path(&name) {
            warnings.push(format!("rejected path-traversal entry: {name}"));
            continue;
        }
        total_bytes += entry.size();
        if total_bytes > MAX_UNCOMPRESSED_BYTES {
            return Ok((
                dir,
                ParseOutcome::failed("archive exceeds uncompressed size cap".to_string()),
            ));
        }

        let dest = dir.path().join(&name);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        std::fs::write(&dest, &buf)?;
        records.push(ParserRecord::ArchiveMember(dest));
    }

    if records.is_empty() {
        return Ok((
            dir,
            ParseOutcome::failed("archive contained no usable members".to_string()),
        ));
    }

    Ok((dir, ParseOutcome::ok(records, warnings)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_entries_are_detected() {
        assert!(is_hidden(".DS_Store"));
        assert!(is_hidden("__MACOSX"));
        assert!(is_hidden("sub/.hidden"));
        assert!(!is_hidden("daily_oil.xlsx"));
    }

    #[test]
    fn traversal_paths_are_rejected() {
        assert!(!is_safe_path("../../etc/passwd"));
        assert!(is_safe_path("reports/daily_oil.xlsx"));
    }

    #[test]
    fn missing_archive_fails_cleanly() {
        let (_dir, outcome) = parse_archive(Path::new("/nonexistent/path.zip")).unwrap();
        assert!(!outcome.success);
    }
}
