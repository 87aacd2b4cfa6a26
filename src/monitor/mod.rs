pub mod fs_watcher;
pub mod s3_poller;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::model::{EventType, Job, JobConfig, JobStatus, JobType, TemplateSourceConfig, TransferTemplate};
use crate::queue::Queue;
use crate::store::Store;
use crate::template_expander::{self, ExpansionContext};
use crate::util::WildcardPattern;

/// A normalized event surfaced by either monitor, ready for template matching. Grounded on
/// `examples/original_source/backend/app/services/event_monitor.py`'s event payloads.
#[derive(Debug, Clone)]
pub struct IncomingEvent {
    pub event_type: EventType,
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub event_time: DateTime<Utc>,
}

/// Whether `event` satisfies `template`'s matching rules (§4.8): event type, `file_pattern`
/// glob, and source-specific scoping (S3 bucket+prefix, or filesystem watch-path prefix).
pub fn matches_template(event: &IncomingEvent, template: &TransferTemplate) -> bool {
    if !template.is_active || template.event_type != event.event_type {
        return false;
    }
    if !WildcardPattern::new(&template.file_pattern).matches(&event.file_name) {
        return false;
    }
    match &template.source_config {
        TemplateSourceConfig::S3 { bucket, prefix, suffix } => {
            let Some(event_bucket) = &event.bucket else { return false };
            if event_bucket != bucket {
                return false;
            }
            let Some(key) = &event.key else { return false };
            if !key.starts_with(prefix.as_str()) {
                return false;
            }
            if let Some(suffix) = suffix {
                if !key.ends_with(suffix.as_str()) {
                    return false;
                }
            }
            true
        }
        TemplateSourceConfig::FileSystem { watch_path } => event.file_path.starts_with(watch_path.as_str()),
        TemplateSourceConfig::Manual => false,
    }
}

/// Shared dispatcher for both monitors (§4.8): on a match, creates one `EVENT_TRIGGERED` job per
/// matching template, enqueues it, and bumps the template's trigger statistics.
pub struct EventDispatcher {
    store: Arc<dyn Store>,
    queue: Arc<dyn Queue>,
}

impl EventDispatcher {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn Queue>) -> Self {
        Self { store, queue }
    }

    pub async fn dispatch(&self, event: IncomingEvent) -> Result<usize, OrchestratorError> {
        let templates = self.store.list_active_templates().await?;
        let mut triggered = 0;
        for mut template in templates {
            if !matches_template(&event, &template) {
                continue;
            }
            self.trigger(&mut template, &event).await?;
            triggered += 1;
        }
        Ok(triggered)
    }

    async fn trigger(&self, template: &mut TransferTemplate, event: &IncomingEvent) -> Result<(), OrchestratorError> {
        let ctx = ExpansionContext::new(&event.file_name, event.event_time);
        let destination_path = template_expander::expand(&template.destination_path_template, &ctx);

        let mut job = Job::new(
            format!("{}-{}", template.name, event.file_name),
            JobType::EventTriggered,
            template.source_endpoint_id,
            event.file_path.clone(),
            event.file_name.clone(),
            template.destination_endpoint_id,
            destination_path,
        );
        job.delete_source_after_transfer = template.delete_source_after_transfer;
        job.status = JobStatus::Queued;
        job.config = JobConfig {
            template_id: Some(template.id),
            chain_rules: template.chain_rules.clone(),
            event_data: Some(json!({
                "bucket": event.bucket,
                "key": event.key,
                "file_size": event.file_size,
                "event_time": event.event_time,
            })),
            ..JobConfig::default()
        };

        self.store.create_job(&job).await?;
        self.queue.enqueue(job.id, 0.0, 0).await?;

        template.record_trigger();
        self.store.save_template(template).await?;

        info!(template_id = %template.id, job_id = %job.id, "event-triggered job enqueued");
        Ok(())
    }
}

pub fn warn_overflow(dropped_kind: &str) {
    warn!(kind = dropped_kind, "event queue overflow, dropping event");
}

#[allow(dead_code)]
pub(crate) fn new_event_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChainRule;

    fn fs_template(watch_path: &str, pattern: &str) -> TransferTemplate {
        TransferTemplate::new(
            "inbox-watch",
            EventType::FileCreated,
            Uuid::new_v4(),
            TemplateSourceConfig::FileSystem { watch_path: watch_path.to_string() },
            Uuid::new_v4(),
            "/dst/{original_filename}",
        )
        .tap_pattern(pattern)
    }

    trait Tap {
        fn tap_pattern(self, pattern: &str) -> Self;
    }
    impl Tap for TransferTemplate {
        fn tap_pattern(mut self, pattern: &str) -> Self {
            self.file_pattern = pattern.to_string();
            self
        }
    }

    fn fs_event(path: &str, name: &str) -> IncomingEvent {
        IncomingEvent {
            event_type: EventType::FileCreated,
            file_path: path.to_string(),
            file_name: name.to_string(),
            file_size: 100,
            bucket: None,
            key: None,
            event_time: Utc::now(),
        }
    }

    // S5 — filesystem event matches a FILE_CREATED template scoped to its watch path.
    #[test]
    fn matches_file_created_template_under_watch_path_and_pattern() {
        let template = fs_template("/inbox", "*.mov");
        assert!(matches_template(&fs_event("/inbox/clip.mov", "clip.mov"), &template));
        assert!(!matches_template(&fs_event("/other/clip.mov", "clip.mov"), &template));
        assert!(!matches_template(&fs_event("/inbox/clip.txt", "clip.txt"), &template));
    }

    #[test]
    fn s3_template_matches_bucket_prefix_and_suffix() {
        let template = TransferTemplate::new(
            "s3-ingest",
            EventType::S3ObjectCreated,
            Uuid::new_v4(),
            TemplateSourceConfig::S3 { bucket: "my-bucket".into(), prefix: "incoming/".into(), suffix: Some(".mp4".into()) },
            Uuid::new_v4(),
            "/dst/{original_filename}",
        );
        let event = IncomingEvent {
            event_type: EventType::S3ObjectCreated,
            file_path: "s3://my-bucket/incoming/a.mp4".into(),
            file_name: "a.mp4".into(),
            file_size: 10,
            bucket: Some("my-bucket".into()),
            key: Some("incoming/a.mp4".into()),
            event_time: Utc::now(),
        };
        assert!(matches_template(&event, &template));

        let wrong_bucket =
            IncomingEvent { bucket: Some("other-bucket".into()), ..event.clone() };
        assert!(!matches_template(&wrong_bucket, &template));
    }

    #[tokio::test]
    async fn dispatch_creates_one_job_per_matching_template_and_carries_chain_rules() {
        use crate::queue::memory::InMemoryQueue;
        use crate::store::memory::InMemoryStore;

        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let mut template = fs_template("/inbox", "*.mov");
        template.chain_rules = vec![ChainRule { endpoint_id: Uuid::new_v4(), path_template: "/backup/{filename}".into() }];
        store.create_template(&template).await.unwrap();

        let dispatcher = EventDispatcher::new(store.clone(), queue.clone());
        let triggered = dispatcher.dispatch(fs_event("/inbox/clip.mov", "clip.mov")).await.unwrap();
        assert_eq!(triggered, 1);
        assert_eq!(queue.length().await.unwrap(), 1);

        let saved_template = store.get_template(template.id).await.unwrap();
        assert_eq!(saved_template.total_triggers, 1);
        assert!(saved_template.last_triggered.is_some());
    }
}
