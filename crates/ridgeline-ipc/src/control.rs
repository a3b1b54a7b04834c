//! A multiplexed request/response envelope for the filesystem-framed
//! control channel `ridgeline-cli` and `ridgeline-daemon` share in lieu of
//! a real socket transport (IPC client transport, authentication tokens
//! and socket framing live outside this crate). Component-scoped queries
//! and commands need a synchronous round trip the existing `local/`
//! deployment-request directory (see `watcher.rs`) doesn't model — this
//! gives them one without inventing a real transport.

use serde::{Deserialize, Serialize};

use crate::{
    CommandOutcome, ComponentDetails, GetComponentDetails, ListComponents, RestartComponent,
    StopComponent, UpdateRecipesAndArtifacts,
};

/// One request dropped by `ridgeline-cli` into a control directory the
/// daemon polls alongside its deployment-document directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlRequest {
    GetComponentDetails(GetComponentDetails),
    ListComponents(ListComponents),
    RestartComponent(RestartComponent),
    StopComponent(StopComponent),
    UpdateRecipesAndArtifacts(UpdateRecipesAndArtifacts),
}

/// The message-level error carried back in a [`ControlResponse`]. IPC
/// errors are not themselves serializable (they wrap non-`Serialize`
/// core errors), so the daemon renders one down to its display text
/// before writing the response file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlError(pub String);

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<crate::IpcError> for ControlError {
    fn from(error: crate::IpcError) -> Self {
        Self(error.to_string())
    }
}

/// The daemon's reply, written to a response file named after the
/// request's id once handling completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlResponse {
    ComponentDetails(Result<ComponentDetails, ControlError>),
    Components(Vec<ComponentDetails>),
    Outcome(Result<CommandOutcome, ControlError>),
    /// Number of recipes installed by an `UpdateRecipesAndArtifacts`
    /// request.
    Preloaded(Result<usize, ControlError>),
}
