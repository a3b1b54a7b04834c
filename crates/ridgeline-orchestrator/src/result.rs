//! `DeploymentResult`: the outcome the orchestrator reports for one
//! deployment task.

use ridgeline_core::ComponentName;

/// The status of one deployment attempt. The first five are terminal;
/// `RestartPending` is not — it reports that a bootstrap-requiring
/// component asked for a supervisor restart, and the deployment will
/// resume in `KERNEL_ACTIVATION` on the next process start rather than
/// concluding within this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStatus {
    Successful,
    FailedNoStateChange,
    FailedRollbackNotRequested,
    FailedRollbackComplete,
    FailedUnableToRollback,
    RestartPending,
}

/// What the orchestrator reports back to whichever producer (cloud job
/// queue or local CLI) submitted the task.
#[derive(Debug, Clone)]
pub struct DeploymentResult {
    pub deployment_id: String,
    pub status: DeploymentStatus,
    /// Components that entered `Broken` during the Apply phase, if any —
    /// carried for diagnostics regardless of final status.
    pub broken_components: Vec<ComponentName>,
    pub message: Option<String>,
}

impl DeploymentResult {
    #[must_use]
    pub fn successful(deployment_id: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            status: DeploymentStatus::Successful,
            broken_components: Vec::new(),
            message: None,
        }
    }

    #[must_use]
    pub fn failed(deployment_id: impl Into<String>, status: DeploymentStatus, message: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            status,
            broken_components: Vec::new(),
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn restart_pending(deployment_id: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            status: DeploymentStatus::RestartPending,
            broken_components: Vec::new(),
            message: Some("bootstrap stage requested a supervisor restart; resuming in KERNEL_ACTIVATION on next start".to_string()),
        }
    }
}
