//! Message-type contracts for the local IPC surface. The transport
//! itself — sockets, framing, auth tokens — lives outside this crate;
//! it only fixes the request/response shapes and the lifecycle
//! subscription channel messages so
//! `ridgeline-cli` and `ridgeline-daemon` agree on them without either
//! depending on a concrete transport.

mod control;
mod deployment;
mod error;
mod lifecycle;
pub mod paths;
mod query;

pub use control::{ControlError, ControlRequest, ControlResponse};
pub use deployment::{
    CreateLocalDeployment, DeploymentRecord, GetLocalDeploymentStatus, ListLocalDeployments,
    LocalDeploymentStatus,
};
pub use error::IpcError;
pub use lifecycle::{DeferComponentUpdate, LifecycleEvent, PreComponentUpdate};
pub use query::{
    ComponentDetails, GetComponentDetails, ListComponents, RestartComponent, StopComponent,
    UpdateRecipesAndArtifacts,
};

/// Every request on the local IPC surface is idempotent on this stated
/// key: re-sending the same request with the same key must not
/// duplicate its effect. Concretely this is the component name for
/// component-scoped requests and the deployment id for deployment-scoped
/// ones.
pub trait IdempotencyKey {
    fn idempotency_key(&self) -> &str;
}

/// Whether a component-affecting IPC command succeeded outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandOutcome {
    Succeeded,
    Failed,
}
