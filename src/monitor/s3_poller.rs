//! S3 event monitor (C8). Polls each monitored bucket on an interval, deduplicates by
//! `(bucket, key, etag)` against a bounded in-memory set, and hands new objects to the shared
//! dispatcher. Grounded on
//! `examples/original_source/backend/app/services/event_monitor.py` (`S3EventMonitor`-style
//! polling loop) and uses `aws-sdk-s3`/`aws-config` — the one dependency this crate adds with no
//! direct precedent in the example pack (no example repo reaches for an S3 SDK); picked as the
//! ecosystem-standard client since nothing closer exists in the corpus (see `DESIGN.md`).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use tracing::{error, warn};

use super::{EventDispatcher, IncomingEvent};
use crate::model::EventType;

/// Bound on the polling dedup set (§4.8: "bounded in-memory set of the last <=10,000 seen").
const DEDUP_CAPACITY: usize = 10_000;

pub struct S3Poller {
    client: S3Client,
    dispatcher: Arc<EventDispatcher>,
    poll_interval: Duration,
    seen: std::sync::Mutex<VecDeque<String>>,
}

impl S3Poller {
    pub fn new(client: S3Client, dispatcher: Arc<EventDispatcher>, poll_interval: Duration) -> Self {
        Self { client, dispatcher, poll_interval, seen: std::sync::Mutex::new(VecDeque::with_capacity(DEDUP_CAPACITY)) }
    }

    fn already_seen(&self, dedup_key: &str) -> bool {
        let mut seen = self.seen.lock().unwrap();
        if seen.iter().any(|k| k == dedup_key) {
            return true;
        }
        if seen.len() >= DEDUP_CAPACITY {
            seen.pop_front();
        }
        seen.push_back(dedup_key.to_string());
        false
    }

    /// Runs the poll loop forever against `buckets`. Intended to be spawned as a daemon task.
    pub async fn run(&self, buckets: &[String]) {
        loop {
            for bucket in buckets {
                if let Err(e) = self.poll_once(bucket).await {
                    error!(bucket = %bucket, error = %e, "s3 poll failed");
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn poll_once(&self, bucket: &str) -> Result<(), aws_sdk_s3::Error> {
        let max_age = self.poll_interval * 2;
        let resp = self.client.list_objects_v2().bucket(bucket).max_keys(100).send().await?;
        for object in resp.contents() {
            let (Some(key), Some(etag)) = (object.key(), object.e_tag()) else { continue };
            if let Some(last_modified) = object.last_modified() {
                let age_secs = Utc::now().timestamp() - last_modified.secs();
                if age_secs > max_age.as_secs() as i64 {
                    continue;
                }
            }

            let dedup_key = format!("{bucket}:{key}:{etag}");
            if self.already_seen(&dedup_key) {
                continue;
            }

            let file_name = key.rsplit('/').next().unwrap_or(key).to_string();
            let event = IncomingEvent {
                event_type: EventType::S3ObjectCreated,
                file_path: format!("s3://{bucket}/{key}"),
                file_name,
                file_size: object.size().unwrap_or(0) as u64,
                bucket: Some(bucket.to_string()),
                key: Some(key.to_string()),
                event_time: Utc::now(),
            };

            if let Err(e) = self.dispatcher.dispatch(event).await {
                warn!(bucket = %bucket, key = %key, error = %e, "failed to dispatch s3 event");
            }
        }
        Ok(())
    }
}
