//! Worker (C6): dequeues a job, expands it to transfers, drives each through the adapter,
//! finalizes status, and invokes the chain generator on full success. Shaped after a per-job
//! resolved-context executor (pluggable dependencies, progress/metrics accumulated as each
//! transfer completes) and generalized from per-process channel workers to a single polling
//! async task — multiple worker *processes* provide the parallelism named in §5, not multiple
//! in-process pollers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapter::Adapter;
use crate::chain;
use crate::error::OrchestratorError;
use crate::model::{Endpoint, Job, JobStatus, Transfer};
use crate::queue::Queue;
use crate::store::Store;
use crate::template_expander::{self, ExpansionContext};
use crate::throttle::ThrottleController;

pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub throttle_acquire_timeout: Duration,
    pub throttled_requeue_delay_secs: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            throttle_acquire_timeout: Duration::from_secs(30),
            throttled_requeue_delay_secs: 60,
        }
    }
}

pub struct Worker {
    store: Arc<dyn Store>,
    queue: Arc<dyn Queue>,
    adapter: Arc<dyn Adapter>,
    throttle: Arc<ThrottleController>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        store: Arc<dyn Store>,
        queue: Arc<dyn Queue>,
        adapter: Arc<dyn Adapter>,
        throttle: Arc<ThrottleController>,
        config: WorkerConfig,
    ) -> Self {
        Self { store, queue, adapter, throttle, config }
    }

    /// Runs the poll loop forever. Intended to be spawned as one of the daemon's top-level tasks.
    pub async fn run(&self) {
        loop {
            match self.queue.dequeue().await {
                Ok(Some(job_id)) => {
                    if let Err(e) = self.process(job_id).await {
                        error!(job_id = %job_id, error = %e, "job processing failed");
                    }
                }
                Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                Err(e) => {
                    warn!(error = %e, "queue dequeue error, backing off");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    /// Processes a single dequeued job id end to end. Exposed directly (not just via `run`) so
    /// integration tests can drive individual scenarios deterministically.
    pub async fn process(&self, job_id: Uuid) -> Result<(), OrchestratorError> {
        let mut job = self.store.get_job(job_id).await?;
        if !job.status.can_start() {
            warn!(job_id = %job_id, status = ?job.status, "dequeued job not in a startable state, dropping");
            return Ok(());
        }
        job.status = JobStatus::Running;
        job.started_at.get_or_insert(Utc::now());
        job.last_run_at = Some(Utc::now());
        job.total_runs += 1;
        self.store.save_job(&job).await?;

        if !self.throttle.can_start(job.source_endpoint_id, job.destination_endpoint_id).await? {
            job.status = JobStatus::Queued;
            self.store.save_job(&job).await?;
            self.queue.enqueue(job.id, 0.0, self.config.throttled_requeue_delay_secs).await?;
            return Ok(());
        }

        let source = self.store.get_endpoint(job.source_endpoint_id).await?;
        let destination = self.store.get_endpoint(job.destination_endpoint_id).await?;

        let files = self.adapter.list_files(&source, &job.source_path, &job.file_pattern).await?;
        if files.is_empty() {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.successful_runs += 1;
            self.store.save_job(&job).await?;
            return Ok(());
        }

        job.total_files = files.len() as u32;
        job.total_bytes = files.iter().map(|f| f.size).sum();
        self.store.save_job(&job).await?;

        let mut transfers = Vec::with_capacity(files.len());
        for file in &files {
            let transfer = Transfer::new(job.id, file.name.clone(), file.path.clone(), file.size);
            self.store.create_transfer(&transfer).await?;
            transfers.push(transfer);
        }

        let mut all_succeeded = true;
        let mut last_error = None;
        let mut cancelled_at = None;

        for index in 0..transfers.len() {
            match self.run_transfer(&job, &source, &destination, &mut transfers[index]).await {
                Ok(()) => {
                    job.transferred_files += 1;
                    job.transferred_bytes += transfers[index].bytes_transferred;
                }
                Err(OrchestratorError::Cancelled) => {
                    cancelled_at = Some(index);
                    all_succeeded = false;
                    break;
                }
                Err(e) => {
                    all_succeeded = false;
                    last_error = Some(e.to_string());
                }
            }
            job.progress_percentage = (job.transferred_files as f64 / job.total_files as f64) * 100.0;
            self.store.save_job(&job).await?;
        }

        if let Some(index) = cancelled_at {
            for remaining in &mut transfers[index + 1..] {
                remaining.cancel();
                self.store.save_transfer(remaining).await?;
            }
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(Utc::now());
            self.store.save_job(&job).await?;
            return Ok(());
        }

        if all_succeeded {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.successful_runs += 1;
            self.store.save_job(&job).await?;
            self.spawn_chain_jobs(&job, &transfers).await?;
        } else {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            job.failed_runs += 1;
            job.error_message = last_error;
            self.store.save_job(&job).await?;
        }

        Ok(())
    }

    async fn run_transfer(
        &self,
        job: &Job,
        source: &Endpoint,
        destination: &Endpoint,
        transfer: &mut Transfer,
    ) -> Result<(), OrchestratorError> {
        self.throttle.acquire(source.id, self.config.throttle_acquire_timeout).await?;
        self.throttle.acquire(destination.id, self.config.throttle_acquire_timeout).await?;
        let result = self.run_transfer_slots_held(job, source, destination, transfer).await;
        self.throttle.release(source.id).await?;
        self.throttle.release(destination.id).await?;
        result
    }

    async fn run_transfer_slots_held(
        &self,
        job: &Job,
        source: &Endpoint,
        destination: &Endpoint,
        transfer: &mut Transfer,
    ) -> Result<(), OrchestratorError> {
        let resolved_destination = resolve_destination_path(&job.destination_path, &transfer.file_name);
        transfer.start(resolved_destination.clone());
        self.store.save_transfer(transfer).await?;

        let source_url = crate::adapter::build_url(
            &source.name,
            source.kind(),
            local_base_path(source),
            crate::adapter::s3_bucket(source),
            &transfer.file_path,
        );
        let dest_url = crate::adapter::build_url(
            &destination.name,
            destination.kind(),
            local_base_path(destination),
            crate::adapter::s3_bucket(destination),
            &resolved_destination,
        );

        self.adapter.configure(source).await?;
        self.adapter.configure(destination).await?;

        let mut handle = self
            .adapter
            .start_copy(&source_url, &dest_url, job.delete_source_after_transfer, destination.bandwidth_limit_kbps)
            .await?;

        loop {
            if self.store.get_job(job.id).await?.status == JobStatus::Cancelled {
                self.adapter.cancel(handle).await?;
                transfer.cancel();
                self.store.save_transfer(transfer).await?;
                return Err(OrchestratorError::Cancelled);
            }
            match self.adapter.poll_progress(&mut handle).await? {
                Some(update) => {
                    transfer.bytes_transferred = update.bytes_transferred;
                    transfer.progress_percentage = update.percent;
                    transfer.transfer_rate_bps = Some(update.rate_bps);
                    transfer.eta_seconds = update.eta_secs;
                    self.store.save_transfer(transfer).await?;
                    if update.percent >= 100.0 {
                        break;
                    }
                }
                None => break,
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        match self.adapter.finish(handle).await {
            Ok(()) => {
                transfer.complete();
                self.store.save_transfer(transfer).await?;
                info!(job_id = %job.id, file = %transfer.file_name, "transfer completed");
                Ok(())
            }
            Err(e) => {
                transfer.fail(e.to_string());
                self.store.save_transfer(transfer).await?;
                Err(OrchestratorError::Adapter(e))
            }
        }
    }

    async fn spawn_chain_jobs(&self, job: &Job, transfers: &[Transfer]) -> Result<(), OrchestratorError> {
        let children = chain::create_chain_jobs(job, transfers);
        for mut child in children {
            self.store.create_job(&child).await?;
            child.status = JobStatus::Queued;
            self.store.save_job(&child).await?;
            self.queue.enqueue(child.id, 0.0, 0).await?;
        }
        Ok(())
    }
}

fn local_base_path(endpoint: &Endpoint) -> Option<&str> {
    match &endpoint.config {
        crate::model::EndpointConfig::Local { base_path } => base_path.as_deref(),
        _ => None,
    }
}

/// Expands the job's destination template against one file name. If the expansion already ends
/// with the filename (the template embedded `{filename}`/`{original_filename}`), the result is
/// the full destination file path; otherwise the expansion is a directory and the filename is
/// appended (§4.6 step 4).
fn resolve_destination_path(destination_template: &str, file_name: &str) -> String {
    let ctx = ExpansionContext::new(file_name, Utc::now());
    let expanded = template_expander::expand(destination_template, &ctx);
    if expanded.ends_with(file_name) {
        expanded
    } else {
        format!("{}/{}", expanded.trim_end_matches('/'), file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{FakeAdapter, FileEntry};
    use crate::model::{ChainRule, EndpointConfig, JobType, TransferStatus};
    use crate::queue::memory::InMemoryQueue;
    use crate::store::memory::InMemoryStore;

    fn endpoint(name: &str) -> Endpoint {
        Endpoint::new(name, EndpointConfig::Local { base_path: None }, 4)
    }

    async fn setup() -> (Worker, Arc<InMemoryStore>, Arc<FakeAdapter>, Endpoint, Endpoint) {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let adapter = Arc::new(FakeAdapter::new());
        let throttle = Arc::new(ThrottleController::new(queue.clone()));
        let src = endpoint("src");
        let dst = endpoint("dst");
        throttle.set_limit(src.id, 4).await;
        throttle.set_limit(dst.id, 4).await;
        store.create_endpoint(&src).await.unwrap();
        store.create_endpoint(&dst).await.unwrap();
        let worker = Worker::new(store.clone(), queue.clone(), adapter.clone(), throttle, WorkerConfig::default());
        (worker, store, adapter, src, dst)
    }

    // S1 — batch with per-file chain.
    #[tokio::test]
    async fn batch_job_fans_out_per_file_chain_jobs() {
        let (worker, store, adapter, src, dst) = setup().await;
        adapter.seed_files(
            "src",
            vec![
                FileEntry { name: "a.mp4".into(), path: "/src/a.mp4".into(), size: 10 },
                FileEntry { name: "b.mp4".into(), path: "/src/b.mp4".into(), size: 10 },
            ],
        );
        let backup = endpoint("backup");
        store.create_endpoint(&backup).await.unwrap();

        let mut job = Job::new("batch", JobType::Manual, src.id, "/src", "*.mp4", dst.id, "/dst/{year}/{original_filename}");
        job.config.chain_rules = vec![ChainRule { endpoint_id: backup.id, path_template: "/backup/{year}/{filename}".into() }];
        store.create_job(&job).await.unwrap();

        worker.process(job.id).await.unwrap();

        let finished = store.get_job(job.id).await.unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.transferred_files, 2);

        let children = store.list_child_jobs(job.id).await.unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.job_type == JobType::Chained));
        assert!(children.iter().all(|c| c.destination_endpoint_id == backup.id));
    }

    // S2 — partial failure yields no chain jobs.
    #[tokio::test]
    async fn partial_failure_fails_job_and_spawns_no_chain_jobs() {
        let (worker, store, adapter, src, dst) = setup().await;
        adapter.seed_files(
            "src",
            vec![
                FileEntry { name: "a.mp4".into(), path: "/src/a.mp4".into(), size: 10 },
                FileEntry { name: "b.mp4".into(), path: "/src/b.mp4".into(), size: 10 },
            ],
        );
        let backup = endpoint("backup");
        store.create_endpoint(&backup).await.unwrap();
        adapter.fail_destination("/dst/b.mp4");

        let mut job = Job::new("batch", JobType::Manual, src.id, "/src", "*.mp4", dst.id, "/dst/{original_filename}");
        job.config.chain_rules = vec![ChainRule { endpoint_id: backup.id, path_template: "/backup/{filename}".into() }];
        store.create_job(&job).await.unwrap();

        worker.process(job.id).await.unwrap();

        let finished = store.get_job(job.id).await.unwrap();
        assert_eq!(finished.status, JobStatus::Failed);
        assert!(store.list_child_jobs(job.id).await.unwrap().is_empty());
    }

    // §8 invariant 11 — empty listing completes with zero transfers.
    #[tokio::test]
    async fn empty_listing_completes_with_zero_transfers() {
        let (worker, store, _adapter, src, dst) = setup().await;
        let job = Job::new("empty", JobType::Manual, src.id, "/src", "*.mp4", dst.id, "/dst/{original_filename}");
        store.create_job(&job).await.unwrap();
        worker.process(job.id).await.unwrap();
        let finished = store.get_job(job.id).await.unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.total_files, 0);
        assert!(store.list_child_jobs(job.id).await.unwrap().is_empty());
    }

    // §5 Cancellation — an external CANCEL request observed mid-job aborts the in-flight
    // transfer, marks any not-yet-started transfers CANCELLED too, and spawns no chain jobs.
    #[tokio::test]
    async fn cancellation_observed_during_transfer_stops_the_job_without_chaining() {
        let (worker, store, adapter, src, dst) = setup().await;
        adapter.seed_files(
            "src",
            vec![
                FileEntry { name: "a.mp4".into(), path: "/src/a.mp4".into(), size: 10 },
                FileEntry { name: "b.mp4".into(), path: "/src/b.mp4".into(), size: 10 },
            ],
        );
        let backup = endpoint("backup");
        store.create_endpoint(&backup).await.unwrap();

        let mut job = Job::new("cancel-me", JobType::Manual, src.id, "/src", "*.mp4", dst.id, "/dst/{original_filename}");
        job.config.chain_rules = vec![ChainRule { endpoint_id: backup.id, path_template: "/backup/{filename}".into() }];
        store.create_job(&job).await.unwrap();

        let store_for_cancel = store.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let mut cancelling = store_for_cancel.get_job(job_id).await.unwrap();
            cancelling.status = JobStatus::Cancelled;
            store_for_cancel.save_job(&cancelling).await.unwrap();
        });

        worker.process(job.id).await.unwrap();

        let finished = store.get_job(job.id).await.unwrap();
        assert_eq!(finished.status, JobStatus::Cancelled);
        assert!(store.list_child_jobs(job.id).await.unwrap().is_empty());

        let transfers = store.list_transfers_for_job(job.id).await.unwrap();
        assert!(transfers.iter().any(|t| t.status == TransferStatus::Cancelled));
    }

    #[test]
    fn resolve_destination_path_appends_filename_when_template_is_a_directory() {
        let resolved = resolve_destination_path("/dst/2025", "a.mp4");
        assert_eq!(resolved, "/dst/2025/a.mp4");
    }

    #[test]
    fn resolve_destination_path_uses_expansion_as_is_when_it_already_ends_in_filename() {
        let resolved = resolve_destination_path("/dst/{original_filename}", "a.mp4");
        assert_eq!(resolved, "/dst/a.mp4");
    }
}
