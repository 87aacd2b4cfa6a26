//! Per-endpoint throttling controller (C4). Grounded on
//! `examples/original_source/backend/app/services/throttle_controller.py`: `acquire_slot` is a
//! read-increment-recheck loop with a 1s backoff; losing the race decrements and retries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ThrottleError;
use crate::queue::Queue;

const BACKOFF: Duration = Duration::from_secs(1);

pub struct ThrottleController {
    queue: Arc<dyn Queue>,
    limits: RwLock<HashMap<Uuid, u32>>,
}

impl ThrottleController {
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self { queue, limits: RwLock::new(HashMap::new()) }
    }

    pub async fn set_limit(&self, endpoint_id: Uuid, limit: u32) {
        self.limits.write().await.insert(endpoint_id, limit.max(1));
    }

    async fn limit_for(&self, endpoint_id: Uuid) -> u32 {
        self.limits.read().await.get(&endpoint_id).copied().unwrap_or(1)
    }

    /// Non-binding read used by the worker before deciding whether to proceed (§4.4).
    pub async fn can_acquire(&self, endpoint_id: Uuid) -> Result<bool, ThrottleError> {
        let limit = self.limit_for(endpoint_id).await;
        let current = self.queue.get_counter(endpoint_id).await?;
        Ok(current < limit as i64)
    }

    pub async fn can_start(&self, source_endpoint_id: Uuid, destination_endpoint_id: Uuid) -> Result<bool, ThrottleError> {
        Ok(self.can_acquire(source_endpoint_id).await? && self.can_acquire(destination_endpoint_id).await?)
    }

    /// Acquires one slot for `endpoint_id`, retrying until `timeout` elapses.
    pub async fn acquire(&self, endpoint_id: Uuid, timeout: Duration) -> Result<(), ThrottleError> {
        let limit = self.limit_for(endpoint_id).await as i64;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let new_count = self.queue.incr_counter(endpoint_id).await?;
            if new_count <= limit {
                return Ok(());
            }
            self.queue.decr_counter(endpoint_id).await?;
            if tokio::time::Instant::now() >= deadline {
                return Err(ThrottleError::AcquireTimeout(endpoint_id.to_string(), timeout.as_secs()));
            }
            tokio::time::sleep(BACKOFF).await;
        }
    }

    pub async fn release(&self, endpoint_id: Uuid) -> Result<(), ThrottleError> {
        self.queue.decr_counter(endpoint_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::memory::InMemoryQueue;

    #[tokio::test]
    async fn acquire_respects_limit_then_release_frees_a_slot() {
        let queue = Arc::new(InMemoryQueue::new());
        let throttle = ThrottleController::new(queue);
        let ep = Uuid::new_v4();
        throttle.set_limit(ep, 1).await;

        throttle.acquire(ep, Duration::from_millis(50)).await.unwrap();
        assert!(!throttle.can_acquire(ep).await.unwrap());
        assert!(throttle.acquire(ep, Duration::from_millis(50)).await.is_err());

        throttle.release(ep).await.unwrap();
        assert!(throttle.can_acquire(ep).await.unwrap());
    }

    #[tokio::test]
    async fn can_start_checks_both_endpoints() {
        let queue = Arc::new(InMemoryQueue::new());
        let throttle = ThrottleController::new(queue);
        let src = Uuid::new_v4();
        let dst = Uuid::new_v4();
        throttle.set_limit(src, 1).await;
        throttle.set_limit(dst, 1).await;
        assert!(throttle.can_start(src, dst).await.unwrap());
        throttle.acquire(dst, Duration::from_millis(50)).await.unwrap();
        assert!(!throttle.can_start(src, dst).await.unwrap());
    }
}
