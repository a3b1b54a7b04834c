//! Directory conventions the filesystem stand-in for the local IPC
//! transport uses (the real socket transport lives outside this crate).
//! `ridgeline-daemon` polls these directories and
//! `ridgeline-cli` writes/reads them; both sides import this module so
//! the layout is defined exactly once.

use std::path::{Path, PathBuf};

/// Full `DeploymentDocument`s from the cloud job queue producer.
#[must_use]
pub fn iot_dir(incoming_dir: &Path) -> PathBuf {
    incoming_dir.join("iot")
}

/// `CreateLocalDeployment` requests from the local CLI producer.
#[must_use]
pub fn local_dir(incoming_dir: &Path) -> PathBuf {
    incoming_dir.join("local")
}

/// Persisted [`crate::DeploymentRecord`]s, one file per deployment id,
/// the daemon mirrors to disk so a separate CLI process can poll
/// `GetLocalDeploymentStatus` / `ListLocalDeployments` back off it.
#[must_use]
pub fn local_status_dir(incoming_dir: &Path) -> PathBuf {
    incoming_dir.join("local-status")
}

/// [`crate::ControlRequest`]s for component-scoped queries and commands.
#[must_use]
pub fn control_dir(incoming_dir: &Path) -> PathBuf {
    incoming_dir.join("control")
}

/// [`crate::ControlResponse`]s, one file per request id.
#[must_use]
pub fn control_responses_dir(incoming_dir: &Path) -> PathBuf {
    incoming_dir.join("control-responses")
}

/// Cancellation markers: an empty file named after a deployment id,
/// dropped here to request cancellation of that deployment while it is
/// in flight. The daemon's cancel watcher polls this directory
/// independently of the deployment lane so cancellation is observed even
/// while the lane is mid-deployment (e.g. sleeping through a deferral
/// reschedule).
#[must_use]
pub fn cancel_dir(incoming_dir: &Path) -> PathBuf {
    incoming_dir.join("cancel")
}

#[must_use]
pub fn cancel_marker_path(incoming_dir: &Path, deployment_id: &str) -> PathBuf {
    cancel_dir(incoming_dir).join(deployment_id)
}
