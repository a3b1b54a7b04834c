//! A filesystem-backed client for the local IPC surface.
//!
//! The socket transport a real deployment of this surface would use
//! lives outside this crate; this workspace's stand-in is the directory
//! layout `ridgeline_ipc::paths` defines and `ridgeline-daemon`'s poll
//! loop drains (`watcher.rs`). This
//! client writes request files into it and polls for the daemon's
//! response, so every command below reads like a synchronous RPC to its
//! caller even though nothing crosses a socket.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ridgeline_ipc::{
    paths, ControlRequest, ControlResponse, CreateLocalDeployment, DeploymentRecord,
    GetComponentDetails, ListComponents, LocalDeploymentStatus, RestartComponent, StopComponent,
    UpdateRecipesAndArtifacts,
};

/// Root of the daemon's persisted state and the directory it polls for
/// incoming requests — resolved identically to `ridgeline-daemon`'s own
/// `SupervisorConfig` so the two binaries agree on a filesystem contract
/// without sharing a crate.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    incoming_dir: PathBuf,
    poll_interval: Duration,
    timeout: Duration,
}

impl DaemonClient {
    #[must_use]
    pub fn new(incoming_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            incoming_dir: incoming_dir.into(),
            poll_interval: Duration::from_millis(200),
            timeout,
        }
    }

    /// Drop a `CreateLocalDeployment` request and return the deployment id
    /// the daemon will file its history record under.
    pub fn create_local_deployment(&self, request: &CreateLocalDeployment) -> Result<String> {
        let id = new_request_id();
        let path = paths::local_dir(&self.incoming_dir).join(format!("{id}.json"));
        write_request(&path, request)?;
        Ok(id)
    }

    /// Poll `<incoming_dir>/local-status/<id>.json` for the daemon's most
    /// recent record of this deployment.
    pub fn deployment_status(&self, deployment_id: &str) -> Result<Option<DeploymentRecord>> {
        let path = paths::local_status_dir(&self.incoming_dir).join(format!("{deployment_id}.json"));
        read_optional(&path)
    }

    /// Block (up to `self.timeout`) until the deployment reaches a
    /// terminal status, polling the persisted history record.
    pub fn await_deployment(&self, deployment_id: &str) -> Result<DeploymentRecord> {
        let deadline = std::time::Instant::now() + self.timeout;
        loop {
            if let Some(record) = self.deployment_status(deployment_id)? {
                if !matches!(
                    record.status,
                    LocalDeploymentStatus::Queued | LocalDeploymentStatus::InProgress
                ) {
                    return Ok(record);
                }
            }
            if std::time::Instant::now() >= deadline {
                bail!("timed out waiting for deployment '{deployment_id}' to settle");
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// List every deployment record the daemon has persisted, oldest
    /// first.
    pub fn list_deployments(&self) -> Result<Vec<DeploymentRecord>> {
        let dir = paths::local_status_dir(&self.incoming_dir);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Ok(Vec::new());
        };
        let mut records: Vec<DeploymentRecord> = entries
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|entry| std::fs::read(entry.path()).ok())
            .filter_map(|bytes| sonic_rs::from_slice(&bytes).ok())
            .collect();
        records.sort_by_key(|r: &DeploymentRecord| r.created_at);
        Ok(records)
    }

    pub fn list_components(&self) -> Result<Vec<ridgeline_ipc::ComponentDetails>> {
        match self.roundtrip(ControlRequest::ListComponents(ListComponents))? {
            ControlResponse::Components(components) => Ok(components),
            other => bail!("unexpected response to ListComponents: {other:?}"),
        }
    }

    pub fn component_details(&self, name: ridgeline_core::ComponentName) -> Result<ridgeline_ipc::ComponentDetails> {
        match self.roundtrip(ControlRequest::GetComponentDetails(GetComponentDetails { name }))? {
            ControlResponse::ComponentDetails(result) => result.map_err(|e| anyhow::anyhow!(e)),
            other => bail!("unexpected response to GetComponentDetails: {other:?}"),
        }
    }

    pub fn restart_component(&self, name: ridgeline_core::ComponentName) -> Result<ridgeline_ipc::CommandOutcome> {
        match self.roundtrip(ControlRequest::RestartComponent(RestartComponent { name }))? {
            ControlResponse::Outcome(result) => result.map_err(|e| anyhow::anyhow!(e)),
            other => bail!("unexpected response to RestartComponent: {other:?}"),
        }
    }

    pub fn stop_component(&self, name: ridgeline_core::ComponentName) -> Result<ridgeline_ipc::CommandOutcome> {
        match self.roundtrip(ControlRequest::StopComponent(StopComponent { name }))? {
            ControlResponse::Outcome(result) => result.map_err(|e| anyhow::anyhow!(e)),
            other => bail!("unexpected response to StopComponent: {other:?}"),
        }
    }

    /// `UpdateRecipesAndArtifacts(recipeDir, artifactDir) -> preloads the
    /// store`. Returns the number of recipes installed.
    pub fn update_recipes_and_artifacts(&self, request: &UpdateRecipesAndArtifacts) -> Result<usize> {
        match self.roundtrip(ControlRequest::UpdateRecipesAndArtifacts(request.clone()))? {
            ControlResponse::Preloaded(result) => result.map_err(|e| anyhow::anyhow!(e)),
            other => bail!("unexpected response to UpdateRecipesAndArtifacts: {other:?}"),
        }
    }

    fn roundtrip(&self, request: ControlRequest) -> Result<ControlResponse> {
        let id = new_request_id();
        let request_path = paths::control_dir(&self.incoming_dir).join(format!("{id}.json"));
        write_request(&request_path, &request)?;

        let response_path = paths::control_responses_dir(&self.incoming_dir).join(format!("{id}.json"));
        let deadline = std::time::Instant::now() + self.timeout;
        loop {
            if let Some(response) = read_optional::<ControlResponse>(&response_path)? {
                let _ = std::fs::remove_file(&response_path);
                return Ok(response);
            }
            if std::time::Instant::now() >= deadline {
                bail!("timed out waiting for the daemon to answer a control request");
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

fn write_request<T: serde::Serialize>(path: &Path, payload: &T) -> Result<()> {
    let parent = path.parent().context("request path has no parent directory")?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("creating {}; is the daemon's incoming directory reachable?", parent.display()))?;
    let bytes = sonic_rs::to_vec(payload).context("serializing request")?;
    std::fs::write(path, bytes).with_context(|| format!("writing request to {}", path.display()))
}

fn read_optional<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(sonic_rs::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))?)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error).with_context(|| format!("reading {}", path.display())),
    }
}

/// A timestamp-then-pid request id. Not cryptographically unique, but
/// collisions would require two commands issued in the same millisecond
/// by the same process, which this single-threaded CLI never does.
fn new_request_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("cli-{millis}-{}", std::process::id())
}
