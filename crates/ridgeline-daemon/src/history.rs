//! Tracking for `GetLocalDeploymentStatus` / `ListLocalDeployments`. The
//! IPC transport that would expose these over a socket lives outside this
//! crate; this is the single-writer store the daemon's deployment lane
//! updates. Since `ridgeline-cli` drives the daemon as a separate process
//! rather than in-process, every update is also mirrored to a
//! `<status_dir>/<id>.json` file via [`ridgeline_state::write_atomically`]
//! so the CLI can poll history back off disk.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use ridgeline_ipc::{DeploymentRecord, LocalDeploymentStatus};
use tracing::warn;

#[derive(Debug)]
pub struct DeploymentHistory {
    records: DashMap<String, DeploymentRecord>,
    /// Insertion order, since `DashMap` iteration order is unspecified and
    /// `ListLocalDeployments` should read back in the order deployments
    /// were created.
    order: parking_lot::Mutex<Vec<String>>,
    status_dir: PathBuf,
}

impl DeploymentHistory {
    #[must_use]
    pub fn new(status_dir: impl Into<PathBuf>) -> Self {
        Self {
            records: DashMap::new(),
            order: parking_lot::Mutex::new(Vec::new()),
            status_dir: status_dir.into(),
        }
    }

    pub fn record_queued(&self, deployment_id: &str, group_name: &str) {
        let record = DeploymentRecord {
            deployment_id: deployment_id.to_string(),
            group_name: group_name.to_string(),
            status: LocalDeploymentStatus::Queued,
            created_at: chrono::Utc::now(),
            message: None,
        };
        self.records.insert(deployment_id.to_string(), record.clone());
        self.order.lock().push(deployment_id.to_string());
        self.persist(&record);
    }

    pub fn mark_in_progress(&self, deployment_id: &str) {
        if let Some(mut record) = self.records.get_mut(deployment_id) {
            record.status = LocalDeploymentStatus::InProgress;
            self.persist(&record);
        }
    }

    pub fn mark_terminal(&self, deployment_id: &str, status: LocalDeploymentStatus, message: Option<String>) {
        if let Some(mut record) = self.records.get_mut(deployment_id) {
            record.status = status;
            record.message = message;
            self.persist(&record);
        }
    }

    #[must_use]
    pub fn get(&self, deployment_id: &str) -> Option<DeploymentRecord> {
        self.records.get(deployment_id).map(|r| r.clone())
    }

    #[must_use]
    pub fn list(&self) -> Vec<DeploymentRecord> {
        self.order
            .lock()
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.clone()))
            .collect()
    }

    fn persist(&self, record: &DeploymentRecord) {
        let path = status_path(&self.status_dir, &record.deployment_id);
        match sonic_rs::to_vec(record) {
            Ok(bytes) => {
                if let Err(error) = ridgeline_state::write_atomically(&path, &bytes) {
                    warn!(%error, path = %path.display(), "failed to persist deployment history record");
                }
            }
            Err(error) => warn!(%error, "failed to serialize deployment history record"),
        }
    }
}

fn status_path(status_dir: &Path, deployment_id: &str) -> PathBuf {
    status_dir.join(format!("{deployment_id}.json"))
}

/// Read back every record a daemon process has persisted under
/// `status_dir`, for `ridgeline-cli`'s `ListLocalDeployments` /
/// `GetLocalDeploymentStatus` to consume without sharing the daemon's
/// process memory.
#[must_use]
pub fn read_persisted(status_dir: &Path, deployment_id: &str) -> Option<DeploymentRecord> {
    let bytes = std::fs::read(status_path(status_dir, deployment_id)).ok()?;
    sonic_rs::from_slice(&bytes).ok()
}

/// List every persisted deployment record under `status_dir`, oldest
/// first by `created_at`.
#[must_use]
pub fn list_persisted(status_dir: &Path) -> Vec<DeploymentRecord> {
    let Ok(entries) = std::fs::read_dir(status_dir) else {
        return Vec::new();
    };
    let mut records: Vec<DeploymentRecord> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .filter_map(|entry| std::fs::read(entry.path()).ok())
        .filter_map(|bytes| sonic_rs::from_slice(&bytes).ok())
        .collect();
    records.sort_by_key(|r: &DeploymentRecord| r.created_at);
    records
}
