//! `sqlx`-backed persistence: `CREATE TABLE IF NOT EXISTS`/`INSERT OR REPLACE` CRUD idiom over
//! an async pool shared with the rest of the daemon's Tokio runtime, with schema creation at
//! startup. Each row keeps a handful of indexed columns for querying plus a `data` JSON column
//! holding the full model struct, since these records are richer than a flat key-value row.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Endpoint, Job, JobStatus, Transfer, TransferTemplate};

use super::Store;

pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS endpoints (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                is_active INTEGER NOT NULL,
                data TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transfer_templates (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                is_active INTEGER NOT NULL,
                data TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                job_type TEXT NOT NULL,
                parent_job_id TEXT,
                next_run_at TEXT,
                data TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_parent ON jobs(parent_job_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transfers (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transfers_job ON transfers(job_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Database(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Database(e.to_string()))
}

/// Serializes a unit-variant enum to its serde string representation, for columns that store
/// status/type values as plain text rather than as JSON.
fn enum_as_str<T: serde::Serialize>(value: T) -> Result<String, StoreError> {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .ok_or_else(|| StoreError::Database("failed to serialize enum as string".to_string()))
}

#[async_trait]
impl Store for SqlStore {
    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError> {
        let data = encode(endpoint)?;
        sqlx::query("INSERT OR REPLACE INTO endpoints (id, name, is_active, data) VALUES (?, ?, ?, ?)")
            .bind(endpoint.id.to_string())
            .bind(&endpoint.name)
            .bind(endpoint.is_active as i64)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_endpoint(&self, id: Uuid) -> Result<Endpoint, StoreError> {
        let row = sqlx::query("SELECT data FROM endpoints WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(format!("endpoint {id}")))?;
        decode(row.try_get::<String, _>("data").map_err(|e| StoreError::Database(e.to_string()))?.as_str())
    }

    async fn list_active_endpoints(&self) -> Result<Vec<Endpoint>, StoreError> {
        let rows = sqlx::query("SELECT data FROM endpoints WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        rows.into_iter()
            .map(|row| decode(row.try_get::<String, _>("data").map_err(|e| StoreError::Database(e.to_string()))?.as_str()))
            .collect()
    }

    async fn save_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError> {
        self.create_endpoint(endpoint).await
    }

    async fn create_template(&self, template: &TransferTemplate) -> Result<(), StoreError> {
        let data = encode(template)?;
        sqlx::query("INSERT OR REPLACE INTO transfer_templates (id, name, is_active, data) VALUES (?, ?, ?, ?)")
            .bind(template.id.to_string())
            .bind(&template.name)
            .bind(template.is_active as i64)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_template(&self, id: Uuid) -> Result<TransferTemplate, StoreError> {
        let row = sqlx::query("SELECT data FROM transfer_templates WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(format!("template {id}")))?;
        decode(row.try_get::<String, _>("data").map_err(|e| StoreError::Database(e.to_string()))?.as_str())
    }

    async fn list_active_templates(&self) -> Result<Vec<TransferTemplate>, StoreError> {
        let rows = sqlx::query("SELECT data FROM transfer_templates WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        rows.into_iter()
            .map(|row| decode(row.try_get::<String, _>("data").map_err(|e| StoreError::Database(e.to_string()))?.as_str()))
            .collect()
    }

    async fn save_template(&self, template: &TransferTemplate) -> Result<(), StoreError> {
        self.create_template(template).await
    }

    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        let data = encode(job)?;
        sqlx::query(
            "INSERT OR REPLACE INTO jobs (id, status, job_type, parent_job_id, next_run_at, data)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(job.id.to_string())
        .bind(enum_as_str(job.status)?)
        .bind(enum_as_str(job.job_type)?)
        .bind(job.parent_job_id.map(|id| id.to_string()))
        .bind(job.next_run_at.map(|t| t.to_rfc3339()))
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Job, StoreError> {
        let row = sqlx::query("SELECT data FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        decode(row.try_get::<String, _>("data").map_err(|e| StoreError::Database(e.to_string()))?.as_str())
    }

    async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        self.create_job(job).await
    }

    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let status_str = enum_as_str(status)?;
        let rows = sqlx::query("SELECT data FROM jobs WHERE status = ?")
            .bind(status_str)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        rows.into_iter()
            .map(|row| decode(row.try_get::<String, _>("data").map_err(|e| StoreError::Database(e.to_string()))?.as_str()))
            .collect()
    }

    async fn list_active_scheduled_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query("SELECT data FROM jobs WHERE job_type = 'SCHEDULED'")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        rows.into_iter()
            .map(|row| decode(row.try_get::<String, _>("data").map_err(|e| StoreError::Database(e.to_string()))?.as_str()))
            .collect()
    }

    async fn list_child_jobs(&self, parent_job_id: Uuid) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query("SELECT data FROM jobs WHERE parent_job_id = ?")
            .bind(parent_job_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        rows.into_iter()
            .map(|row| decode(row.try_get::<String, _>("data").map_err(|e| StoreError::Database(e.to_string()))?.as_str()))
            .collect()
    }

    async fn create_transfer(&self, transfer: &Transfer) -> Result<(), StoreError> {
        let data = encode(transfer)?;
        sqlx::query("INSERT OR REPLACE INTO transfers (id, job_id, status, data) VALUES (?, ?, ?, ?)")
            .bind(transfer.id.to_string())
            .bind(transfer.job_id.to_string())
            .bind(enum_as_str(transfer.status)?)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn save_transfer(&self, transfer: &Transfer) -> Result<(), StoreError> {
        self.create_transfer(transfer).await
    }

    async fn list_transfers_for_job(&self, job_id: Uuid) -> Result<Vec<Transfer>, StoreError> {
        let rows = sqlx::query("SELECT data FROM transfers WHERE job_id = ? ORDER BY rowid ASC")
            .bind(job_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        rows.into_iter()
            .map(|row| decode(row.try_get::<String, _>("data").map_err(|e| StoreError::Database(e.to_string()))?.as_str()))
            .collect()
    }
}
