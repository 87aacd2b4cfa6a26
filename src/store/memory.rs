//! In-process `Store` double for integration tests, paired with `queue::memory::InMemoryQueue`
//! so the §8 end-to-end scenarios run without a live SQLite/Postgres database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Endpoint, Job, JobStatus, Transfer, TransferTemplate};

use super::Store;

#[derive(Default)]
pub struct InMemoryStore {
    endpoints: Mutex<HashMap<Uuid, Endpoint>>,
    templates: Mutex<HashMap<Uuid, TransferTemplate>>,
    jobs: Mutex<HashMap<Uuid, Job>>,
    transfers: Mutex<HashMap<Uuid, Transfer>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError> {
        self.endpoints.lock().unwrap().insert(endpoint.id, endpoint.clone());
        Ok(())
    }

    async fn get_endpoint(&self, id: Uuid) -> Result<Endpoint, StoreError> {
        self.endpoints.lock().unwrap().get(&id).cloned().ok_or_else(|| StoreError::NotFound(format!("endpoint {id}")))
    }

    async fn list_active_endpoints(&self) -> Result<Vec<Endpoint>, StoreError> {
        Ok(self.endpoints.lock().unwrap().values().filter(|e| e.is_active).cloned().collect())
    }

    async fn save_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError> {
        self.create_endpoint(endpoint).await
    }

    async fn create_template(&self, template: &TransferTemplate) -> Result<(), StoreError> {
        self.templates.lock().unwrap().insert(template.id, template.clone());
        Ok(())
    }

    async fn get_template(&self, id: Uuid) -> Result<TransferTemplate, StoreError> {
        self.templates.lock().unwrap().get(&id).cloned().ok_or_else(|| StoreError::NotFound(format!("template {id}")))
    }

    async fn list_active_templates(&self) -> Result<Vec<TransferTemplate>, StoreError> {
        Ok(self.templates.lock().unwrap().values().filter(|t| t.is_active).cloned().collect())
    }

    async fn save_template(&self, template: &TransferTemplate) -> Result<(), StoreError> {
        self.create_template(template).await
    }

    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError> {
        self.jobs.lock().unwrap().get(&id).cloned().ok_or_else(|| StoreError::NotFound(format!("job {id}")))
    }

    async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        self.create_job(job).await
    }

    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        Ok(self.jobs.lock().unwrap().values().filter(|j| j.status == status).cloned().collect())
    }

    async fn list_active_scheduled_jobs(&self) -> Result<Vec<Job>, StoreError> {
        use crate::model::JobType;
        Ok(self.jobs.lock().unwrap().values().filter(|j| j.job_type == JobType::Scheduled).cloned().collect())
    }

    async fn list_child_jobs(&self, parent_job_id: Uuid) -> Result<Vec<Job>, StoreError> {
        Ok(self.jobs.lock().unwrap().values().filter(|j| j.parent_job_id == Some(parent_job_id)).cloned().collect())
    }

    async fn create_transfer(&self, transfer: &Transfer) -> Result<(), StoreError> {
        self.transfers.lock().unwrap().insert(transfer.id, transfer.clone());
        Ok(())
    }

    async fn save_transfer(&self, transfer: &Transfer) -> Result<(), StoreError> {
        self.create_transfer(transfer).await
    }

    async fn list_transfers_for_job(&self, job_id: Uuid) -> Result<Vec<Transfer>, StoreError> {
        Ok(self.transfers.lock().unwrap().values().filter(|t| t.job_id == job_id).cloned().collect())
    }
}
