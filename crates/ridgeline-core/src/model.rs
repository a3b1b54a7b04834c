//! Shared data model: recipes, deployment documents and the small set of
//! enums every other crate needs to agree on.

use std::collections::BTreeMap;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::identifier::{ComponentName, VersionConstraint};
use crate::platform::PlatformFilter;
use crate::value::ConfigValue;

/// How a component runs once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    /// An externally launched process managed through its lifecycle script.
    Generic,
    /// The orchestrator itself; activation follows the bootstrap path.
    Nucleus,
    /// An in-process extension loaded into the orchestrator.
    Plugin,
}

/// Whether an unmet dependency blocks activation of the depending
/// component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyKind {
    /// The dependency must reach a success state before this component can
    /// start; a hard dependency entering `BROKEN` propagates failure.
    Hard,
    /// The dependency is started opportunistically but does not block or
    /// fail this component.
    Soft,
}

/// One entry in a recipe's `ComponentDependencies` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRequirement {
    pub version_requirement: VersionConstraint,
    pub dependency_kind: DependencyKind,
}

/// A named lifecycle stage (`install`, `startup`, `run`, `shutdown`,
/// `bootstrap`, `recover`), plus the predicates that gate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleStage {
    pub name: String,
    /// Command line / script body; process launching mechanics themselves
    /// are out of scope, this is carried opaquely.
    pub script: String,
    /// When present, this stage runs only if the update check it names
    /// returns true (used for conditional `bootstrap`/`recover` stages).
    #[serde(default)]
    pub update_check: Option<String>,
    /// When present, the stage is skipped entirely if this predicate is
    /// true (used to no-op `bootstrap` on a first-time install).
    #[serde(default)]
    pub skip_if: Option<String>,
}

/// An artifact reference declared in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub uri: String,
    pub digest: String,
    #[serde(default)]
    pub unarchive: UnarchivePolicy,
}

/// How an installed artifact should be expanded, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnarchivePolicy {
    #[default]
    None,
    Zip,
    Tar,
}

/// One manifest in a recipe's `Manifests` list: a platform filter plus the
/// artifacts and lifecycle that apply when that filter matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub platform: PlatformFilter,
    #[serde(default)]
    pub artifacts: Vec<ArtifactDescriptor>,
    #[serde(default)]
    pub lifecycle: Vec<LifecycleStage>,
}

/// The declarative description of a component, as loaded from a recipe
/// file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRecipe {
    pub component_name: ComponentName,
    pub component_version: Version,
    pub component_type: ComponentType,
    #[serde(default = "ConfigValue::object")]
    pub default_configuration: ConfigValue,
    #[serde(default)]
    pub component_dependencies: BTreeMap<ComponentName, DependencyRequirement>,
    #[serde(default)]
    pub manifests: Vec<Manifest>,
}

/// A per-component configuration delta as carried on a deployment
/// document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationUpdate {
    /// JSON pointers to reset to the recipe default before merging.
    #[serde(default)]
    pub reset: Vec<String>,
    /// Tree to deep-merge on top of the (possibly reset) configuration.
    #[serde(default)]
    pub merge: Option<ConfigValue>,
}

/// What to do when a deployment fails to bring every root component to a
/// success state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureHandlingPolicy {
    DoNothing,
    Rollback,
}

/// Governs how components are notified before an in-place update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentUpdatePolicy {
    #[serde(default)]
    pub skip_notify_components: Vec<ComponentName>,
    #[serde(default = "default_update_timeout")]
    pub timeout_seconds: u32,
    /// When `true`, a deferral vote is still collected but never
    /// reschedules the merge — the merge proceeds on schedule regardless
    /// of what was voted.
    #[serde(default)]
    pub skip_safety_check: bool,
}

fn default_update_timeout() -> u32 {
    60
}

/// Stage of the persisted deployment-lifecycle state machine.
/// Most deployments stay in `Default` and finish within one pass; a
/// bootstrap-requiring component update persists a snapshot here and
/// advances through the rest of the chain across a supervisor restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStage {
    Default,
    Bootstrap,
    KernelActivation,
    KernelRollback,
}

/// A deployment request: the unit of work the orchestrator reconciles
/// against running state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentDocument {
    pub group_name: String,
    pub timestamp: i64,
    pub root_components: BTreeMap<ComponentName, VersionConstraint>,
    #[serde(default)]
    pub configuration_updates: BTreeMap<ComponentName, ConfigurationUpdate>,
    pub failure_handling_policy: FailureHandlingPolicy,
    #[serde(default)]
    pub component_update_policy: ComponentUpdatePolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_update_policy_has_sane_timeout() {
        let policy = ComponentUpdatePolicy::default();
        assert_eq!(policy.timeout_seconds, 60);
        assert!(policy.skip_notify_components.is_empty());
    }

    #[test]
    fn deployment_stage_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&DeploymentStage::KernelActivation).unwrap();
        assert_eq!(json, "\"KERNEL_ACTIVATION\"");
    }
}
