//! Redis-backed `Queue` implementation. Key layout and operations are grounded on
//! `examples/original_source/backend/app/services/redis_manager.py`: a sorted set for the job
//! queue, `setex`-TTL'd status blobs, and per-endpoint integer counters clamped at zero.

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use serde_json::Value;
use uuid::Uuid;

use crate::error::QueueError;

use super::{JOB_STATUS_TTL_SECS, Queue};

pub struct RedisQueue {
    client: redis::Client,
    prefix: String,
}

impl RedisQueue {
    pub fn new(redis_url: &str, prefix: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(|e| QueueError::Transport(e.to_string()))?;
        Ok(Self { client, prefix: prefix.into() })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client.get_multiplexed_async_connection().await.map_err(|e| QueueError::Transport(e.to_string()))
    }

    fn queue_key(&self) -> String {
        format!("{}:job_queue", self.prefix)
    }

    fn status_key(&self, job_id: Uuid) -> String {
        format!("{}:job_status:{}", self.prefix, job_id)
    }

    fn counter_key(&self, endpoint_id: Uuid) -> String {
        format!("{}:endpoint_counters:{}", self.prefix, endpoint_id)
    }
}

#[async_trait]
impl Queue for RedisQueue {
    async fn enqueue(&self, job_id: Uuid, priority: f64, delay_secs: i64) -> Result<(), QueueError> {
        let score = if delay_secs > 0 { Utc::now().timestamp() as f64 + delay_secs as f64 } else { priority };
        let mut conn = self.conn().await?;
        conn.zadd::<_, _, _, ()>(self.queue_key(), job_id.to_string(), score)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))
    }

    async fn dequeue(&self) -> Result<Option<Uuid>, QueueError> {
        let mut conn = self.conn().await?;
        let now = Utc::now().timestamp() as f64;
        let members: Vec<String> = conn
            .zrangebyscore_limit(self.queue_key(), f64::NEG_INFINITY, now, 0, 1)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        let Some(member) = members.into_iter().next() else {
            return Ok(None);
        };
        let removed: i64 = conn
            .zrem(self.queue_key(), &member)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        if removed == 0 {
            // another worker already claimed it between the range read and our zrem.
            return Ok(None);
        }
        Uuid::parse_str(&member).map(Some).map_err(|e| QueueError::Decode(e.to_string()))
    }

    async fn length(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn().await?;
        conn.zcard(self.queue_key()).await.map_err(|e| QueueError::Transport(e.to_string()))
    }

    async fn incr_counter(&self, endpoint_id: Uuid) -> Result<i64, QueueError> {
        let mut conn = self.conn().await?;
        conn.incr(self.counter_key(endpoint_id), 1).await.map_err(|e| QueueError::Transport(e.to_string()))
    }

    async fn decr_counter(&self, endpoint_id: Uuid) -> Result<i64, QueueError> {
        let mut conn = self.conn().await?;
        let new_value: i64 =
            conn.decr(self.counter_key(endpoint_id), 1).await.map_err(|e| QueueError::Transport(e.to_string()))?;
        if new_value < 0 {
            conn.set::<_, _, ()>(self.counter_key(endpoint_id), 0)
                .await
                .map_err(|e| QueueError::Transport(e.to_string()))?;
            return Ok(0);
        }
        Ok(new_value)
    }

    async fn get_counter(&self, endpoint_id: Uuid) -> Result<i64, QueueError> {
        let mut conn = self.conn().await?;
        let value: Option<i64> =
            conn.get(self.counter_key(endpoint_id)).await.map_err(|e| QueueError::Transport(e.to_string()))?;
        Ok(value.unwrap_or(0))
    }

    async fn reset_counter(&self, endpoint_id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(self.counter_key(endpoint_id), 0).await.map_err(|e| QueueError::Transport(e.to_string()))
    }

    async fn set_status(&self, job_id: Uuid, status: Value) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(&status).map_err(|e| QueueError::Decode(e.to_string()))?;
        conn.set_ex::<_, _, ()>(self.status_key(job_id), payload, JOB_STATUS_TTL_SECS)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))
    }

    async fn get_status(&self, job_id: Uuid) -> Result<Option<Value>, QueueError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> =
            conn.get(self.status_key(job_id)).await.map_err(|e| QueueError::Transport(e.to_string()))?;
        match raw {
            Some(s) => serde_json::from_str(&s).map(Some).map_err(|e| QueueError::Decode(e.to_string())),
            None => Ok(None),
        }
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        conn.publish::<_, _, ()>(format!("{}:{}", self.prefix, channel), message)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))
    }
}
