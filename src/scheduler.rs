//! Scheduler (C7): a single 60s wake loop that clones due `SCHEDULED` jobs into `MANUAL`
//! executions. Grounded on
//! `examples/original_source/backend/app/services/scheduler.py`
//! (`_check_scheduled_jobs`, `_execute_scheduled_job`, `_calculate_next_run`,
//! `_update_all_next_run_times`). Cron parsing uses the `cron` crate (5-field form), grounded in
//! `examples/other_examples/manifests/t-yaakov-b2cli/Cargo.toml`'s `cron = "0.12"`.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::model::{Job, JobConfig, JobStatus, JobType};
use crate::queue::Queue;
use crate::store::Store;

pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

pub struct Scheduler {
    store: Arc<dyn Store>,
    queue: Arc<dyn Queue>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn Queue>) -> Self {
        Self { store, queue }
    }

    /// Runs the 60s wake loop forever. Recomputes `next_run_at` for every active scheduled job
    /// on startup to recover from clock drift or downtime (no back-filling of missed runs).
    pub async fn run(&self) {
        if let Err(e) = self.recompute_all_next_runs().await {
            error!(error = %e, "failed to recompute next_run_at on startup");
        }
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                error!(error = %e, "scheduler tick failed");
            }
        }
    }

    pub async fn tick(&self) -> Result<(), OrchestratorError> {
        let now = Utc::now();
        let due: Vec<Job> = self
            .store
            .list_active_scheduled_jobs()
            .await?
            .into_iter()
            .filter(|j| j.next_run_at.map(|t| t <= now).unwrap_or(false))
            .collect();

        for mut parent in due {
            let schedule_str = match &parent.schedule {
                Some(s) => s.clone(),
                None => continue,
            };
            match next_occurrence(&schedule_str, now) {
                Ok(next) => parent.next_run_at = Some(next),
                Err(e) => {
                    error!(job_id = %parent.id, error = %e, "invalid cron expression, leaving next_run_at unchanged");
                }
            }
            self.store.save_job(&parent).await?;
            self.execute_scheduled_job(&parent).await?;
        }
        Ok(())
    }

    async fn execute_scheduled_job(&self, parent: &Job) -> Result<(), OrchestratorError> {
        let mut execution = parent.clone();
        execution.id = Uuid::new_v4();
        execution.job_type = JobType::Manual;
        execution.status = JobStatus::Queued;
        execution.parent_job_id = None;
        execution.schedule = None;
        execution.next_run_at = None;
        execution.created_at = Utc::now();
        execution.started_at = None;
        execution.completed_at = None;
        execution.retry_count = 0;
        execution.total_runs = 0;
        execution.successful_runs = 0;
        execution.failed_runs = 0;
        execution.config = JobConfig { scheduled_execution: true, scheduled_job_id: Some(parent.id), ..parent.config.clone() };

        self.store.create_job(&execution).await?;
        self.queue.enqueue(execution.id, 0.0, 0).await?;
        info!(parent_job_id = %parent.id, execution_job_id = %execution.id, "scheduled job fired");
        Ok(())
    }

    async fn recompute_all_next_runs(&self) -> Result<(), OrchestratorError> {
        let now = Utc::now();
        for mut job in self.store.list_active_scheduled_jobs().await? {
            let Some(schedule_str) = job.schedule.clone() else { continue };
            match next_occurrence(&schedule_str, now) {
                Ok(next) => {
                    job.next_run_at = Some(next);
                    self.store.save_job(&job).await?;
                }
                Err(e) => error!(job_id = %job.id, error = %e, "invalid cron expression on startup recompute"),
            }
        }
        Ok(())
    }
}

/// Parses a 5-field cron expression and returns the next occurrence strictly after `now`
/// (§8 invariant 6). The `cron` crate's own expressions are 6- or 7-field (seconds-first); a
/// leading `0` seconds field is prefixed to adapt the standard 5-field form.
pub fn next_occurrence(expression: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let six_field = format!("0 {expression}");
    let schedule = Schedule::from_str(&six_field).map_err(|e| format!("invalid cron expression '{expression}': {e}"))?;
    schedule.after(&now).next().ok_or_else(|| format!("cron expression '{expression}' has no future occurrence"))
}

/// Validates a cron expression without scheduling anything; exposed to collaborators previewing
/// a schedule before saving a template.
pub fn validate_cron_expression(expression: &str) -> Result<(), String> {
    next_occurrence(expression, Utc::now()).map(|_| ())
}

/// Previews the next `count` occurrences of `expression` after `from`.
pub fn get_next_runs(expression: &str, from: DateTime<Utc>, count: usize) -> Result<Vec<DateTime<Utc>>, String> {
    let six_field = format!("0 {expression}");
    let schedule = Schedule::from_str(&six_field).map_err(|e| format!("invalid cron expression '{expression}': {e}"))?;
    Ok(schedule.after(&from).take(count).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::memory::InMemoryQueue;
    use crate::model::{EndpointConfig, Endpoint};
    use crate::store::memory::InMemoryStore;
    use chrono::TimeZone;

    #[test]
    fn next_occurrence_is_strictly_after_now() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 3, 0).unwrap();
        let next = next_occurrence("*/5 * * * *", now).unwrap();
        assert!(next > now);
        assert_eq!(next.format("%M").to_string(), "05");
    }

    #[test]
    fn validate_rejects_malformed_expressions() {
        assert!(validate_cron_expression("not a cron expression").is_err());
        assert!(validate_cron_expression("*/5 * * * *").is_ok());
    }

    // S4 — cron fire clones a SCHEDULED job into a QUEUED MANUAL execution.
    #[tokio::test]
    async fn due_scheduled_job_is_cloned_as_manual_and_enqueued() {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let _unused = Endpoint::new("noop", EndpointConfig::Local { base_path: None }, 1);
        let scheduler = Scheduler::new(store.clone(), queue.clone());

        let src = Uuid::new_v4();
        let dst = Uuid::new_v4();
        let mut job = Job::new("nightly", JobType::Scheduled, src, "/src", "*", dst, "/dst/{original_filename}");
        job.schedule = Some("*/5 * * * *".to_string());
        job.next_run_at = Some(Utc::now() - chrono::Duration::seconds(1));
        store.create_job(&job).await.unwrap();

        scheduler.tick().await.unwrap();

        let parent = store.get_job(job.id).await.unwrap();
        assert!(parent.next_run_at.unwrap() > Utc::now());

        let children = store.list_child_jobs(job.id).await.unwrap();
        // executions don't carry parent_job_id by design (they are independent MANUAL runs);
        // assert instead via the queue having exactly one new entry.
        assert!(children.is_empty());
        assert_eq!(queue.length().await.unwrap(), 1);
    }
}
