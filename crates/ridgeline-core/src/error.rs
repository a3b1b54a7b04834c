//! Error types shared by every stage of the deployment pipeline.
//!
//! Each variant corresponds to one of the error kinds named in the
//! architecture notes: resolution, component store I/O, configuration,
//! and lifecycle/service errors. Keeping them in one enum lets the
//! orchestrator match on a single type when deciding policy (retry once,
//! surface as deployment failure, or treat as fatal).

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The stable error type for the whole workspace.
#[derive(Error, Debug)]
pub enum Error {
    /// No recipe is available locally or from the artifact collaborator.
    #[error("recipe not found: {name}@{requirement}")]
    RecipeNotFound {
        /// Component name.
        name: String,
        /// The requirement that could not be satisfied.
        requirement: String,
    },

    /// A dependency requirement could not be satisfied by any candidate.
    #[error("dependency conflict on '{name}': {conflicting:?}")]
    DependencyConflict {
        /// Component name in conflict.
        name: String,
        /// The set of conflicting requirement strings.
        conflicting: Vec<String>,
    },

    /// The downloaded/installed artifact does not match its declared digest.
    #[error("digest mismatch for {name}@{version}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Component name.
        name: String,
        /// Component version.
        version: String,
        /// Expected digest (hex).
        expected: String,
        /// Actual digest (hex).
        actual: String,
    },

    /// The artifact collaborator could not produce the requested artifact.
    #[error("artifact download failed for {name}@{version}: {message}")]
    ArtifactDownloadFailed {
        /// Component name.
        name: String,
        /// Component version.
        version: String,
        /// Underlying error message.
        message: String,
    },

    /// A service failed to reach a success state, or reached BROKEN.
    #[error("service update error for '{name}': {message}")]
    ServiceUpdateError {
        /// Component name.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// The deployment was cancelled by its caller before it committed.
    #[error("deployment cancelled")]
    Cancelled,

    /// Generic I/O failure with path context.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The persisted configuration or group-to-roots store is unreadable.
    #[error("config store error: {0}")]
    ConfigStore(String),

    /// Unarchiving a zip/tar artifact failed.
    #[error("archive error: {0}")]
    Archive(String),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization failure, used for recipe files.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON-pointer path was malformed or pointed somewhere disallowed.
    #[error("invalid pointer '{pointer}': {reason}")]
    InvalidPointer {
        /// The offending pointer.
        pointer: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl Error {
    /// Build an [`Error::Io`] with path context, mirroring the common
    /// `Error::io(path, err)` constructor pattern used across the workspace.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` if this error kind is recoverable within a single deployment
    /// attempt (transient I/O, bounded retry once per §7).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::ConfigStore(_))
    }
}

/// Wrapper used where only a short, human string is needed (e.g. inside a
/// JSON pointer diagnostic) but we still want `std::error::Error`.
#[derive(Debug)]
pub struct Context(pub String);

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Context {}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
