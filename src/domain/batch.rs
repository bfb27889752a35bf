use serde::{Deserialize, Serialize};

pub type BatchId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "PENDING",
            BatchStatus::Running => "RUNNING",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
            BatchStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BatchStatus::Pending),
            "RUNNING" => Some(BatchStatus::Running),
            "COMPLETED" => Some(BatchStatus::Completed),
            "FAILED" => Some(BatchStatus::Failed),
            "CANCELLED" => Some(BatchStatus::Cancelled),
            _ => None,
        }
    }

    /// §7: a batch completes `COMPLETED` if at least one file succeeded,
    /// `FAILED` if none did. Derived from per-file outcomes once a run ends.
    pub fn from_outcomes(succeeded: u32, total: u32, cancelled: bool) -> Self {
        if cancelled {
            BatchStatus::Cancelled
        } else if succeeded == 0 && total > 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Option<BatchId>,
    pub name: String,
    pub fingerprint: String,
    pub file_count: u32,
    pub status: BatchStatus,
}

impl Batch {
    pub fn new(name: String, fingerprint: String) -> Self {
        Self {
            id: None,
            name,
            fingerprint,
            file_count: 0,
            status: BatchStatus::Pending,
        }
    }
}
