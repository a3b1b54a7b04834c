//! Polls the incoming-deployment directories for the orchestrator's two
//! task producers: the cloud job queue and the local CLI. The actual IoT
//! Jobs/Shadow transport and the CLI's socket framing live outside this
//! crate; dropping a JSON file into `<incoming_dir>/iot/` or
//! `<incoming_dir>/local/` is this workspace's stand-in producer interface.

use std::path::{Path, PathBuf};

use ridgeline_core::DeploymentDocument;
use ridgeline_ipc::{ControlRequest, CreateLocalDeployment};
use tracing::warn;

/// One file found waiting in an incoming-deployment directory.
pub struct IncomingFile<T> {
    pub path: PathBuf,
    pub payload: T,
}

fn scan_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    // Process in filename order so a fleet that numbers its documents
    // (`0001.json`, `0002.json`, ...) gets a deterministic replay order;
    // `timestamp` inside the document is the authoritative tie-break the
    // resolver itself does not currently need, since each document fully
    // replaces its group's prior roots.
    paths.sort();
    paths
}

/// Poll `<incoming_dir>/iot/` for full `DeploymentDocument`s. Malformed
/// files are logged and skipped rather than blocking the lane.
#[must_use]
pub fn poll_iot_jobs(incoming_dir: &Path) -> Vec<IncomingFile<DeploymentDocument>> {
    let dir = ridgeline_ipc::paths::iot_dir(incoming_dir);
    scan_dir(&dir)
        .into_iter()
        .filter_map(|path| match std::fs::read(&path) {
            Ok(bytes) => match sonic_rs::from_slice::<DeploymentDocument>(&bytes) {
                Ok(payload) => Some(IncomingFile { path, payload }),
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping malformed deployment document");
                    None
                }
            },
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read incoming deployment document");
                None
            }
        })
        .collect()
}

/// Poll `<incoming_dir>/local/` for `CreateLocalDeployment` requests.
#[must_use]
pub fn poll_local_requests(incoming_dir: &Path) -> Vec<IncomingFile<CreateLocalDeployment>> {
    let dir = ridgeline_ipc::paths::local_dir(incoming_dir);
    scan_dir(&dir)
        .into_iter()
        .filter_map(|path| match std::fs::read(&path) {
            Ok(bytes) => match sonic_rs::from_slice::<CreateLocalDeployment>(&bytes) {
                Ok(payload) => Some(IncomingFile { path, payload }),
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping malformed local deployment request");
                    None
                }
            },
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read incoming local deployment request");
                None
            }
        })
        .collect()
}

/// Poll `<incoming_dir>/control/` for [`ControlRequest`]s (component
/// queries and commands). These are synchronous round trips
/// rather than fire-and-forget documents, so the caller is expected to
/// match each returned file's stem against a response it writes back
/// under `<incoming_dir>/control-responses/`.
#[must_use]
pub fn poll_control_requests(incoming_dir: &Path) -> Vec<IncomingFile<ControlRequest>> {
    let dir = ridgeline_ipc::paths::control_dir(incoming_dir);
    scan_dir(&dir)
        .into_iter()
        .filter_map(|path| match std::fs::read(&path) {
            Ok(bytes) => match sonic_rs::from_slice::<ControlRequest>(&bytes) {
                Ok(payload) => Some(IncomingFile { path, payload }),
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping malformed control request");
                    None
                }
            },
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read incoming control request");
                None
            }
        })
        .collect()
}

/// Poll `<incoming_dir>/cancel/` for cancellation markers, returning the
/// deployment ids requested and removing each marker as it's read — a
/// marker is a one-shot request, not a standing cancellation.
#[must_use]
pub fn poll_cancel_requests(incoming_dir: &Path) -> Vec<String> {
    let dir = ridgeline_ipc::paths::cancel_dir(incoming_dir);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut ids = Vec::new();
    for entry in entries.filter_map(std::result::Result::ok) {
        let path = entry.path();
        let Some(id) = path.file_name().and_then(|s| s.to_str()) else { continue };
        ids.push(id.to_string());
        if let Err(error) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), %error, "failed to remove consumed cancellation marker");
        }
    }
    ids
}

/// Build the `DeploymentDocument` a `CreateLocalDeployment` request
/// represents, once merged against the `LOCAL` group's current root map:
/// the requested adds and removes merge into the existing group rather
/// than replacing it outright.
#[must_use]
pub fn build_local_document(
    request: &CreateLocalDeployment,
    existing_local_roots: &std::collections::BTreeMap<ridgeline_core::ComponentName, semver::Version>,
    timestamp: i64,
) -> DeploymentDocument {
    let mut roots: std::collections::BTreeMap<_, _> = existing_local_roots
        .iter()
        .map(|(name, version)| {
            (
                name.clone(),
                ridgeline_core::VersionConstraint::new(format!("={version}")).expect("exact requirement always parses"),
            )
        })
        .collect();
    for name in &request.root_components_to_remove {
        roots.remove(name);
    }
    for (name, requirement) in &request.root_component_versions_to_add {
        roots.insert(name.clone(), requirement.clone());
    }

    DeploymentDocument {
        group_name: request.group_name().to_string(),
        timestamp,
        root_components: roots,
        configuration_updates: request.component_to_configuration.clone(),
        failure_handling_policy: ridgeline_core::FailureHandlingPolicy::Rollback,
        component_update_policy: ridgeline_core::ComponentUpdatePolicy::default(),
    }
}
