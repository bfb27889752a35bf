use super::{BatchId, ReportShape};
use serde::{Deserialize, Serialize};

pub type RawFileId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseStatus {
    Pending,
    Success,
    Partial,
    Failed,
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStatus::Pending => "PENDING",
            ParseStatus::Success => "SUCCESS",
            ParseStatus::Partial => "PARTIAL",
            ParseStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ParseStatus::Pending),
            "SUCCESS" => Some(ParseStatus::Success),
            "PARTIAL" => Some(ParseStatus::Partial),
            "FAILED" => Some(ParseStatus::Failed),
            _ => None,
        }
    }
}

/// An ingested artefact (§3). `fingerprint` is the unique identity the
/// Stager uses for at-most-once processing (§4.C); `record_count`,
/// `warnings`, `errors` are populated at the end of the parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFile {
    pub id: Option<RawFileId>,
    pub filename: String,
    pub fingerprint: String,
    pub size_bytes: u64,
    pub shape: ReportShape,
    pub parse_status: ParseStatus,
    pub source_path: String,
    pub parent_batch: Option<BatchId>,
    pub record_count: u32,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl RawFile {
    pub fn pending(
        filename: String,
        fingerprint: String,
        size_bytes: u64,
        shape: ReportShape,
        source_path: String,
        parent_batch: Option<BatchId>,
    ) -> Self {
        Self {
            id: None,
            filename,
            fingerprint,
            size_bytes,
            shape,
            parse_status: ParseStatus::Pending,
            source_path,
            parent_batch,
            record_count: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }
}
