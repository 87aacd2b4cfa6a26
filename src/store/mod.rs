pub mod memory;
pub mod sql;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Endpoint, Job, JobStatus, Transfer, TransferTemplate};

pub use sql::SqlStore;

/// Async persistence boundary covering `endpoints`, `transfer_templates`, `jobs`, `transfers`
/// (§6.1). `settings` is owned by an external collaborator and is intentionally absent here.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError>;
    async fn get_endpoint(&self, id: Uuid) -> Result<Endpoint, StoreError>;
    async fn list_active_endpoints(&self) -> Result<Vec<Endpoint>, StoreError>;
    async fn save_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError>;

    async fn create_template(&self, template: &TransferTemplate) -> Result<(), StoreError>;
    async fn get_template(&self, id: Uuid) -> Result<TransferTemplate, StoreError>;
    async fn list_active_templates(&self) -> Result<Vec<TransferTemplate>, StoreError>;
    async fn save_template(&self, template: &TransferTemplate) -> Result<(), StoreError>;

    async fn create_job(&self, job: &Job) -> Result<(), StoreError>;
    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError>;
    async fn save_job(&self, job: &Job) -> Result<(), StoreError>;
    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;
    async fn list_active_scheduled_jobs(&self) -> Result<Vec<Job>, StoreError>;
    async fn list_child_jobs(&self, parent_job_id: Uuid) -> Result<Vec<Job>, StoreError>;

    async fn create_transfer(&self, transfer: &Transfer) -> Result<(), StoreError>;
    async fn save_transfer(&self, transfer: &Transfer) -> Result<(), StoreError>;
    async fn list_transfers_for_job(&self, job_id: Uuid) -> Result<Vec<Transfer>, StoreError>;
}
