//! Errors surfaced back over the local IPC surface. Transport-level
//! failures (socket drop, auth rejection) are the caller's concern; this
//! enum covers only request handling once a message has been decoded.

use ridgeline_core::Error as CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("no component named '{0}'")]
    UnknownComponent(String),

    #[error("no local deployment with id '{0}'")]
    UnknownDeployment(String),

    #[error("deployment lane rejected the request: {0}")]
    QueueClosed(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}
