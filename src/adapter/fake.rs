//! Deterministic `Adapter` test double: simulated readers/writers standing in for a live remote.
//! Lets the worker/chain/scheduler integration tests drive the §8 scenarios without a real
//! rclone binary or network endpoint.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::model::Endpoint;

use super::{Adapter, FileEntry, ProgressUpdate, TransferHandle};

#[derive(Default)]
pub struct FakeAdapter {
    /// `endpoint_name -> base_path -> files` fixture consulted by `list_files`.
    files: Mutex<HashMap<String, Vec<FileEntry>>>,
    /// Destination URLs that should fail their copy.
    failing_destinations: Mutex<Vec<String>>,
    copy_log: Mutex<Vec<(String, String)>>,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_files(&self, endpoint_name: &str, entries: Vec<FileEntry>) {
        self.files.lock().unwrap().insert(endpoint_name.to_string(), entries);
    }

    pub fn fail_destination(&self, dest_url: &str) {
        self.failing_destinations.lock().unwrap().push(dest_url.to_string());
    }

    pub fn copy_log(&self) -> Vec<(String, String)> {
        self.copy_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Adapter for FakeAdapter {
    async fn configure(&self, _endpoint: &Endpoint) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn test_reachable(&self, _endpoint: &Endpoint) -> Result<bool, AdapterError> {
        Ok(true)
    }

    async fn list_files(&self, endpoint: &Endpoint, _base_path: &str, glob: &str) -> Result<Vec<FileEntry>, AdapterError> {
        let files = self.files.lock().unwrap();
        let entries = files.get(&endpoint.name).cloned().unwrap_or_default();
        let pattern = crate::util::WildcardPattern::new(glob);
        Ok(entries.into_iter().filter(|f| pattern.matches(&f.name)).collect())
    }

    async fn start_copy(
        &self,
        source_url: &str,
        dest_url: &str,
        _delete_source: bool,
        _bandwidth_limit_kbps: Option<u64>,
    ) -> Result<TransferHandle, AdapterError> {
        self.copy_log.lock().unwrap().push((source_url.to_string(), dest_url.to_string()));
        let succeed = !self.failing_destinations.lock().unwrap().contains(&dest_url.to_string());
        let mut updates = VecDeque::new();
        updates.push_back(ProgressUpdate { bytes_transferred: 0, percent: 0.0, rate_bps: 0.0, eta_secs: None });
        updates.push_back(ProgressUpdate { bytes_transferred: 100, percent: 100.0, rate_bps: 1000.0, eta_secs: Some(0) });
        Ok(TransferHandle::Simulated { updates, succeed })
    }

    async fn poll_progress(&self, handle: &mut TransferHandle) -> Result<Option<ProgressUpdate>, AdapterError> {
        match handle {
            TransferHandle::Simulated { updates, .. } => Ok(updates.pop_front()),
            TransferHandle::Process { .. } => Ok(None),
        }
    }

    async fn finish(&self, handle: TransferHandle) -> Result<(), AdapterError> {
        match handle {
            TransferHandle::Simulated { succeed, .. } => {
                if succeed {
                    Ok(())
                } else {
                    Err(AdapterError::NonZeroExit { status: 1, stderr: "simulated failure".to_string() })
                }
            }
            TransferHandle::Process { .. } => Ok(()),
        }
    }

    async fn cancel(&self, _handle: TransferHandle) -> Result<(), AdapterError> {
        Ok(())
    }
}
