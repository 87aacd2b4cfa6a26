use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// One file moving as part of a job.
///
/// Invariant (§3): `destination_path` is resolved and written *before* the byte stream starts.
/// `Transfer::start` enforces this by taking the resolved path as a parameter; there is no path
/// to `InProgress` that leaves `destination_path` unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub job_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub destination_path: Option<String>,
    pub file_size: u64,
    pub bytes_transferred: u64,
    pub progress_percentage: f64,
    pub transfer_rate_bps: Option<f64>,
    pub eta_seconds: Option<i64>,
    pub status: TransferStatus,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transfer {
    pub fn new(job_id: Uuid, file_name: impl Into<String>, file_path: impl Into<String>, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            file_name: file_name.into(),
            file_path: file_path.into(),
            destination_path: None,
            file_size,
            bytes_transferred: 0,
            progress_percentage: 0.0,
            transfer_rate_bps: None,
            eta_seconds: None,
            status: TransferStatus::Pending,
            error_message: None,
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Transitions `Pending -> InProgress`, recording the resolved destination path.
    pub fn start(&mut self, resolved_destination_path: impl Into<String>) {
        self.destination_path = Some(resolved_destination_path.into());
        self.status = TransferStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = TransferStatus::Completed;
        self.progress_percentage = 100.0;
        self.bytes_transferred = self.file_size;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = TransferStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    /// Marks the transfer `CANCELLED` (§5): either the current in-flight transfer, aborted mid
    /// copy once the owning worker observes its job has been cancelled, or a sibling transfer
    /// that never got to start once the job itself is abandoned.
    pub fn cancel(&mut self) {
        self.status = TransferStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_always_sets_destination_path() {
        let mut t = Transfer::new(Uuid::new_v4(), "a.mp4", "/src/a.mp4", 1024);
        assert!(t.destination_path.is_none());
        t.start("/dst/2025/a.mp4");
        assert_eq!(t.destination_path.as_deref(), Some("/dst/2025/a.mp4"));
        assert_eq!(t.status, TransferStatus::InProgress);
    }
}
