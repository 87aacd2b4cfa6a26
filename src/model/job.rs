use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::template::ChainRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Manual,
    EventTriggered,
    Scheduled,
    Chained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Retrying,
    Cancelled,
}

impl JobStatus {
    /// Only these statuses may become `Running`; see §4.6.
    pub fn can_start(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Queued | JobStatus::Retrying)
    }
}

/// Structured job payload. Modeled as a concrete struct rather than a generic map (§9 Design
/// Notes) so a `CHAINED` job's per-file bookkeeping is available without stringly-typed lookups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    /// Authoritative chain rules for this job's own execution (see the Open Question in §9:
    /// whoever creates the job must copy these in; the worker never re-reads the template).
    #[serde(default)]
    pub chain_rules: Vec<ChainRule>,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub parent_transfer_id: Option<Uuid>,
    #[serde(default)]
    pub chain_index: Option<u32>,
    #[serde(default)]
    pub chain_rule: Option<ChainRule>,
    #[serde(default)]
    pub event_data: Option<serde_json::Value>,
    #[serde(default)]
    pub scheduled_execution: bool,
    #[serde(default)]
    pub scheduled_job_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub job_type: JobType,
    pub status: JobStatus,

    pub source_endpoint_id: Uuid,
    pub source_path: String,
    pub file_pattern: String,
    pub destination_endpoint_id: Uuid,
    pub destination_path: String,
    pub delete_source_after_transfer: bool,

    pub parent_job_id: Option<Uuid>,
    pub schedule: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub config: JobConfig,

    pub total_files: u32,
    pub transferred_files: u32,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub progress_percentage: f64,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,

    pub retry_count: u32,
    pub max_retries: u32,

    pub total_runs: u32,
    pub successful_runs: u32,
    pub failed_runs: u32,

    pub error_message: Option<String>,
}

impl Job {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        job_type: JobType,
        source_endpoint_id: Uuid,
        source_path: impl Into<String>,
        file_pattern: impl Into<String>,
        destination_endpoint_id: Uuid,
        destination_path: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            job_type,
            status: JobStatus::Pending,
            source_endpoint_id,
            source_path: source_path.into(),
            file_pattern: file_pattern.into(),
            destination_endpoint_id,
            destination_path: destination_path.into(),
            delete_source_after_transfer: false,
            parent_job_id: None,
            schedule: None,
            next_run_at: None,
            config: JobConfig::default(),
            total_files: 0,
            transferred_files: 0,
            total_bytes: 0,
            transferred_bytes: 0,
            progress_percentage: 0.0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_run_at: None,
            retry_count: 0,
            max_retries: 3,
            total_runs: 0,
            successful_runs: 0,
            failed_runs: 0,
            error_message: None,
        }
    }

    /// Invariant: a CHAINED job always carries a parent; a SCHEDULED job always carries a
    /// cron schedule.
    pub fn validate_type_invariants(&self) -> Result<(), String> {
        if self.job_type == JobType::Chained && self.parent_job_id.is_none() {
            return Err("CHAINED job missing parent_job_id".to_string());
        }
        if self.job_type == JobType::Scheduled && self.schedule.is_none() {
            return Err("SCHEDULED job missing schedule".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_job_without_parent_fails_validation() {
        let ep = Uuid::new_v4();
        let mut job = Job::new("chain-child", JobType::Chained, ep, "/x", "*", ep, "/y");
        assert!(job.validate_type_invariants().is_err());
        job.parent_job_id = Some(Uuid::new_v4());
        assert!(job.validate_type_invariants().is_ok());
    }

    #[test]
    fn only_pending_queued_retrying_can_start() {
        assert!(JobStatus::Pending.can_start());
        assert!(JobStatus::Queued.can_start());
        assert!(JobStatus::Retrying.can_start());
        assert!(!JobStatus::Running.can_start());
        assert!(!JobStatus::Completed.can_start());
    }
}
