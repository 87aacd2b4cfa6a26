pub mod memory;
pub mod redis_queue;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::QueueError;

/// Distributed priority queue + shared counters + status cache (C1). Scores are floats;
/// `dequeue` only returns entries whose score is at or before "now", matching the reference
/// `enqueue_job`/`dequeue_job` zadd/zrangebyscore-then-zrem pair.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn enqueue(&self, job_id: Uuid, priority: f64, delay_secs: i64) -> Result<(), QueueError>;
    async fn dequeue(&self) -> Result<Option<Uuid>, QueueError>;
    async fn length(&self) -> Result<u64, QueueError>;

    async fn incr_counter(&self, endpoint_id: Uuid) -> Result<i64, QueueError>;
    /// Decrements, clamped at zero (§4.1, §8 invariant 10).
    async fn decr_counter(&self, endpoint_id: Uuid) -> Result<i64, QueueError>;
    async fn get_counter(&self, endpoint_id: Uuid) -> Result<i64, QueueError>;
    async fn reset_counter(&self, endpoint_id: Uuid) -> Result<(), QueueError>;

    /// Caches a JSON status blob for `job_id` with a 24h TTL (§6.2).
    async fn set_status(&self, job_id: Uuid, status: Value) -> Result<(), QueueError>;
    async fn get_status(&self, job_id: Uuid) -> Result<Option<Value>, QueueError>;

    async fn publish(&self, channel: &str, message: &str) -> Result<(), QueueError>;
}

/// TTL for cached job status blobs (§6.2).
pub const JOB_STATUS_TTL_SECS: u64 = 24 * 60 * 60;
