use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    S3ObjectCreated,
    FileCreated,
    FileModified,
    ManualTrigger,
}

/// Declares an additional destination for every file the owning job delivers successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRule {
    pub endpoint_id: Uuid,
    pub path_template: String,
}

/// Source-side matching configuration, shaped by the template's `event_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TemplateSourceConfig {
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: Option<String>,
    },
    FileSystem {
        watch_path: String,
    },
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferTemplate {
    pub id: Uuid,
    pub name: String,
    pub event_type: EventType,
    pub source_endpoint_id: Uuid,
    pub source_config: TemplateSourceConfig,
    pub destination_endpoint_id: Uuid,
    pub destination_path_template: String,
    pub chain_rules: Vec<ChainRule>,
    pub file_pattern: String,
    pub delete_source_after_transfer: bool,
    pub is_active: bool,
    pub total_triggers: u64,
    pub last_triggered: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TransferTemplate {
    pub fn new(
        name: impl Into<String>,
        event_type: EventType,
        source_endpoint_id: Uuid,
        source_config: TemplateSourceConfig,
        destination_endpoint_id: Uuid,
        destination_path_template: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            event_type,
            source_endpoint_id,
            source_config,
            destination_endpoint_id,
            destination_path_template: destination_path_template.into(),
            chain_rules: Vec::new(),
            file_pattern: "*".to_string(),
            delete_source_after_transfer: false,
            is_active: true,
            total_triggers: 0,
            last_triggered: None,
            created_at: Utc::now(),
        }
    }

    /// Bumps trigger statistics; called by the event dispatcher (C8) on every match.
    pub fn record_trigger(&mut self) {
        self.total_triggers += 1;
        self.last_triggered = Some(Utc::now());
    }
}
