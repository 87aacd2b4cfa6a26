//! Explicit dependency wiring: no global singletons, just the shared handles the daemon's
//! worker, scheduler, and event-monitor tasks are built from.

use std::sync::Arc;

use anyhow::Result;

use crate::adapter::rclone::RcloneAdapter;
use crate::adapter::Adapter;
use crate::config::AppConfig;
use crate::queue::redis_queue::RedisQueue;
use crate::queue::Queue;
use crate::store::sql::SqlStore;
use crate::store::Store;
use crate::throttle::ThrottleController;

/// Everything a worker, scheduler, or event monitor task needs, constructed once at startup and
/// shared behind `Arc` across every `tokio::spawn`ed task.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn Queue>,
    pub adapter: Arc<dyn Adapter>,
    pub throttle: Arc<ThrottleController>,
    pub config: AppConfig,
}

impl AppState {
    /// Connects to the database and queue backends and builds the real `rclone`-backed adapter.
    pub async fn connect(config: AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.state_dir)?;

        let store: Arc<dyn Store> = Arc::new(SqlStore::connect(&config.database_url).await?);
        let queue: Arc<dyn Queue> = Arc::new(RedisQueue::new(&config.queue_redis_url, config.queue_key_prefix.clone())?);
        let adapter: Arc<dyn Adapter> =
            Arc::new(RcloneAdapter::new(config.rclone_bin.clone(), config.state_dir.clone(), config.adapter_timeout));
        let throttle = Arc::new(ThrottleController::new(queue.clone()));

        Ok(Self { store, queue, adapter, throttle, config })
    }
}
