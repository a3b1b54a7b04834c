//! Shared types for the ridgeline deployment pipeline: component
//! identifiers, version constraints, the dynamic configuration tree, the
//! recipe/deployment-document data model, and platform manifest selection.
//!
//! Every other crate in the workspace depends on this one; it has no
//! dependencies on its siblings.

pub mod error;
pub mod identifier;
pub mod json;
pub mod model;
pub mod platform;
pub mod value;

pub use error::{Error, Result};
pub use identifier::{ComponentIdentifier, ComponentName, VersionConstraint};
pub use model::{
    ArtifactDescriptor, ComponentRecipe, ComponentType, ComponentUpdatePolicy,
    ConfigurationUpdate, DependencyKind, DependencyRequirement, DeploymentDocument,
    DeploymentStage, FailureHandlingPolicy, LifecycleStage, Manifest, UnarchivePolicy,
};
pub use platform::{Platform, PlatformFilter};
pub use value::ConfigValue;
