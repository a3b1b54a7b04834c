//! Local deployment creation and status polling:
//! `CreateLocalDeployment`, `GetLocalDeploymentStatus`,
//! `ListLocalDeployments`.
//!
//! `CreateLocalDeployment` itself does not build a `DeploymentDocument` —
//! that requires merging the request against the device's existing
//! `LOCAL` group roots, which only the daemon (holding the live
//! `GroupToRootComponents`) can do. This crate only fixes the
//! request/response shape.

use std::collections::BTreeMap;

use ridgeline_core::{ComponentName, ConfigurationUpdate, VersionConstraint};
use serde::{Deserialize, Serialize};

use crate::IdempotencyKey;

/// `CreateLocalDeployment({rootComponentVersionsToAdd,
/// rootComponentsToRemove, componentToConfiguration, groupName}) ->
/// deploymentId`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateLocalDeployment {
    /// Roots to add or pin to a new version; merged into the existing
    /// `LOCAL` group's root map rather than replacing it.
    #[serde(default)]
    pub root_component_versions_to_add: BTreeMap<ComponentName, VersionConstraint>,
    /// Roots to drop from the `LOCAL` group on this deployment.
    #[serde(default)]
    pub root_components_to_remove: Vec<ComponentName>,
    #[serde(default)]
    pub component_to_configuration: BTreeMap<ComponentName, ConfigurationUpdate>,
    /// Defaults to the conventional `LOCAL` group name when omitted.
    #[serde(default)]
    pub group_name: Option<String>,
}

impl CreateLocalDeployment {
    #[must_use]
    pub fn group_name(&self) -> &str {
        self.group_name.as_deref().unwrap_or(LOCAL_GROUP_NAME)
    }
}

/// The conventional group name for CLI-originated deployments: the local
/// deployment producer always writes into this fixed group.
pub const LOCAL_GROUP_NAME: &str = "LOCAL";

/// `GetLocalDeploymentStatus(deploymentId) -> {QUEUED, IN_PROGRESS,
/// SUCCEEDED, FAILED}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLocalDeploymentStatus {
    pub deployment_id: String,
}

impl IdempotencyKey for GetLocalDeploymentStatus {
    fn idempotency_key(&self) -> &str {
        &self.deployment_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalDeploymentStatus {
    Queued,
    InProgress,
    Succeeded,
    Failed,
}

/// `ListLocalDeployments() -> history`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListLocalDeployments;

/// One entry in the history `ListLocalDeployments` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployment_id: String,
    pub group_name: String,
    pub status: LocalDeploymentStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub message: Option<String>,
}
