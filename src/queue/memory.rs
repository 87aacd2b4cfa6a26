//! In-process `Queue` double used by integration tests (§8 scenarios) so they don't need a live
//! Redis instance, simulating the transport layer instead of exercising a real server.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::error::QueueError;

use super::Queue;

#[derive(Default)]
struct State {
    scores: HashMap<Uuid, f64>,
    counters: HashMap<Uuid, i64>,
    status: HashMap<Uuid, Value>,
    published: Vec<(String, String)>,
}

pub struct InMemoryQueue {
    state: Mutex<State>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self { state: Mutex::new(State::default()) }
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().published.clone()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, job_id: Uuid, priority: f64, delay_secs: i64) -> Result<(), QueueError> {
        let score = if delay_secs > 0 { Utc::now().timestamp() as f64 + delay_secs as f64 } else { priority };
        self.state.lock().unwrap().scores.insert(job_id, score);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Uuid>, QueueError> {
        let now = Utc::now().timestamp() as f64;
        let mut state = self.state.lock().unwrap();
        let due = state
            .scores
            .iter()
            .filter(|(_, &score)| score <= now)
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(id, _)| *id);
        if let Some(id) = due {
            state.scores.remove(&id);
        }
        Ok(due)
    }

    async fn length(&self) -> Result<u64, QueueError> {
        Ok(self.state.lock().unwrap().scores.len() as u64)
    }

    async fn incr_counter(&self, endpoint_id: Uuid) -> Result<i64, QueueError> {
        let mut state = self.state.lock().unwrap();
        let entry = state.counters.entry(endpoint_id).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn decr_counter(&self, endpoint_id: Uuid) -> Result<i64, QueueError> {
        let mut state = self.state.lock().unwrap();
        let entry = state.counters.entry(endpoint_id).or_insert(0);
        *entry = (*entry - 1).max(0);
        Ok(*entry)
    }

    async fn get_counter(&self, endpoint_id: Uuid) -> Result<i64, QueueError> {
        Ok(*self.state.lock().unwrap().counters.get(&endpoint_id).unwrap_or(&0))
    }

    async fn reset_counter(&self, endpoint_id: Uuid) -> Result<(), QueueError> {
        self.state.lock().unwrap().counters.insert(endpoint_id, 0);
        Ok(())
    }

    async fn set_status(&self, job_id: Uuid, status: Value) -> Result<(), QueueError> {
        self.state.lock().unwrap().status.insert(job_id, status);
        Ok(())
    }

    async fn get_status(&self, job_id: Uuid) -> Result<Option<Value>, QueueError> {
        Ok(self.state.lock().unwrap().status.get(&job_id).cloned())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), QueueError> {
        self.state.lock().unwrap().published.push((channel.to_string(), message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_then_dequeue_returns_same_id() {
        let q = InMemoryQueue::new();
        let id = Uuid::new_v4();
        q.enqueue(id, 0.0, 0).await.unwrap();
        assert_eq!(q.dequeue().await.unwrap(), Some(id));
        assert_eq!(q.dequeue().await.unwrap(), None);
    }

    #[tokio::test]
    async fn double_enqueue_keeps_single_entry() {
        let q = InMemoryQueue::new();
        let id = Uuid::new_v4();
        q.enqueue(id, 5.0, 0).await.unwrap();
        q.enqueue(id, 1.0, 0).await.unwrap();
        assert_eq!(q.length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn counter_clamps_at_zero() {
        let q = InMemoryQueue::new();
        let ep = Uuid::new_v4();
        assert_eq!(q.decr_counter(ep).await.unwrap(), 0);
        q.incr_counter(ep).await.unwrap();
        assert_eq!(q.decr_counter(ep).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delayed_entry_not_due_yet() {
        let q = InMemoryQueue::new();
        let id = Uuid::new_v4();
        q.enqueue(id, 0.0, 60).await.unwrap();
        assert_eq!(q.dequeue().await.unwrap(), None);
        assert_eq!(q.length().await.unwrap(), 1);
    }
}
