//! Shared fixtures for the ridgeline workspace's integration tests:
//! recipe builders, a fake [`ArtifactSource`] backed by an in-memory
//! recipe table, and a fake [`ServiceSupervisor`] whose install/start
//! outcomes for individual components are configurable — enough to drive
//! end-to-end deployment scenarios without a real process launcher or
//! download transport.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use ridgeline_core::platform::PlatformFilter;
use ridgeline_core::{
    ComponentName, ComponentRecipe, ComponentType, ComponentUpdatePolicy, ConfigValue, DependencyKind,
    DependencyRequirement, DeploymentDocument, FailureHandlingPolicy, LifecycleStage, Manifest, VersionConstraint,
};
use ridgeline_fetch::{ArtifactSource, FetchRequest, FetchedBytes};
use ridgeline_lifecycle::{BootstrapOutcome, ServiceState, ServiceSupervisor};
use semver::Version;

/// Build a bare recipe with no dependencies and no lifecycle stages,
/// suitable as a leaf in a dependency graph.
#[must_use]
pub fn recipe(name: &str, version: &str) -> ComponentRecipe {
    ComponentRecipe {
        component_name: ComponentName::new(name).expect("fixture name is valid"),
        component_version: Version::parse(version).expect("fixture version is valid"),
        component_type: ComponentType::Generic,
        default_configuration: ConfigValue::object(),
        component_dependencies: BTreeMap::new(),
        manifests: vec![Manifest {
            platform: PlatformFilter { os: None, architecture: None },
            artifacts: vec![],
            lifecycle: vec![],
        }],
    }
}

/// Build a recipe declaring one dependency on `dep_name` at `dep_requirement`
/// (e.g. `"^1.0.0"`), of the given kind.
#[must_use]
pub fn recipe_depending_on(
    name: &str,
    version: &str,
    dep_name: &str,
    dep_requirement: &str,
    dependency_kind: DependencyKind,
) -> ComponentRecipe {
    let mut r = recipe(name, version);
    r.component_dependencies.insert(
        ComponentName::new(dep_name).expect("fixture dependency name is valid"),
        DependencyRequirement {
            version_requirement: VersionConstraint::new(dep_requirement).expect("fixture requirement is valid"),
            dependency_kind,
        },
    );
    r
}

/// Attach a named lifecycle stage (e.g. `"bootstrap"`) with the given
/// script body to a recipe's sole manifest.
#[must_use]
pub fn with_lifecycle_stage(mut r: ComponentRecipe, stage_name: &str, script: &str) -> ComponentRecipe {
    r.manifests[0].lifecycle.push(LifecycleStage {
        name: stage_name.to_string(),
        script: script.to_string(),
        update_check: None,
        skip_if: None,
    });
    r
}

/// Build a `DeploymentDocument` with the given `(name, exact version)` root
/// set and failure-handling policy, and a zero-second update-check timeout
/// (no deployment in this fixture set waits on a real deferral window).
#[must_use]
pub fn document(roots: &[(&str, &str)], policy: FailureHandlingPolicy) -> DeploymentDocument {
    document_with_policy(
        roots,
        policy,
        ComponentUpdatePolicy {
            skip_notify_components: vec![],
            timeout_seconds: 0,
            skip_safety_check: false,
        },
    )
}

#[must_use]
pub fn document_with_policy(
    roots: &[(&str, &str)],
    policy: FailureHandlingPolicy,
    component_update_policy: ComponentUpdatePolicy,
) -> DeploymentDocument {
    let mut root_components = BTreeMap::new();
    for (name, version) in roots {
        root_components.insert(
            ComponentName::new(*name).expect("fixture name is valid"),
            VersionConstraint::new(format!("={version}")).expect("exact requirement always parses"),
        );
    }
    DeploymentDocument {
        group_name: "thing-group".to_string(),
        timestamp: 0,
        root_components,
        configuration_updates: BTreeMap::new(),
        failure_handling_policy: policy,
        component_update_policy,
    }
}

/// An in-memory recipe table standing in for the cloud artifact download
/// transport. Every `(name, version)` pair added
/// is reachable both as a "remote" candidate and as the bytes an install
/// fetches.
#[derive(Default)]
pub struct FakeArtifactSource {
    recipes: Mutex<BTreeMap<ComponentName, Vec<ComponentRecipe>>>,
}

impl FakeArtifactSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source pre-populated with `recipes`, keyed by their own
    /// `component_name`.
    #[must_use]
    pub fn with_recipes(recipes: impl IntoIterator<Item = ComponentRecipe>) -> Self {
        let source = Self::new();
        for recipe in recipes {
            source.add(recipe);
        }
        source
    }

    pub fn add(&self, recipe: ComponentRecipe) {
        self.recipes
            .lock()
            .entry(recipe.component_name.clone())
            .or_default()
            .push(recipe);
    }

    fn find(&self, name: &ComponentName, version: &Version) -> Option<ComponentRecipe> {
        self.recipes
            .lock()
            .get(name)?
            .iter()
            .find(|r| &r.component_version == version)
            .cloned()
    }
}

#[async_trait]
impl ArtifactSource for FakeArtifactSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedBytes, String> {
        match request {
            FetchRequest::Recipe(id) => {
                let recipe = self.find(&id.name, &id.version).ok_or("no such fixture recipe")?;
                let bytes = serde_yaml_bytes(&recipe)?;
                Ok(FetchedBytes { data: bytes })
            }
            FetchRequest::Artifact { .. } => Ok(FetchedBytes { data: b"fixture-payload".to_vec() }),
        }
    }

    async fn list_remote_versions(&self, name: &ComponentName) -> Vec<Version> {
        self.recipes
            .lock()
            .get(name)
            .map(|versions| versions.iter().map(|r| r.component_version.clone()).collect())
            .unwrap_or_default()
    }
}

fn serde_yaml_bytes(recipe: &ComponentRecipe) -> Result<Vec<u8>, String> {
    // The recipe fixture table is authored in Rust, not loaded from disk,
    // so round-tripping through JSON (which every recipe field already
    // derives) is equivalent to YAML here and avoids a direct
    // `serde_yaml` dependency in this crate.
    sonic_rs::to_vec(recipe).map_err(|e| e.to_string())
}

/// A fake running supervisor: every `install`/`start`/`stop` call updates
/// an in-memory state map instead of touching a real process. Components
/// named in `break_on_start` go `Broken` instead of `Running` when
/// started, modeling a broken dependency that should trigger rollback.
/// Components named in `restart_on_bootstrap` request a supervisor
/// restart from their `bootstrap` stage.
#[derive(Default)]
pub struct FakeSupervisor {
    states: Mutex<BTreeMap<ComponentName, ServiceState>>,
    break_on_start: std::collections::BTreeSet<ComponentName>,
    restart_on_bootstrap: std::collections::BTreeSet<ComponentName>,
}

impl FakeSupervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn breaking_on_start(mut self, names: &[&str]) -> Self {
        self.break_on_start = names.iter().map(|n| ComponentName::new(*n).unwrap()).collect();
        self
    }

    #[must_use]
    pub fn restarting_on_bootstrap(mut self, names: &[&str]) -> Self {
        self.restart_on_bootstrap = names.iter().map(|n| ComponentName::new(*n).unwrap()).collect();
        self
    }

    #[must_use]
    pub fn running_components(&self) -> std::collections::BTreeSet<ComponentName> {
        self.states
            .lock()
            .iter()
            .filter(|(_, state)| state.is_success())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ServiceSupervisor for FakeSupervisor {
    async fn install(&self, name: &ComponentName, _lifecycle: &[LifecycleStage]) -> Result<(), String> {
        self.states.lock().insert(name.clone(), ServiceState::Installed);
        Ok(())
    }

    async fn start(&self, name: &ComponentName) -> Result<(), String> {
        let state = if self.break_on_start.contains(name) {
            ServiceState::Broken
        } else {
            ServiceState::Running
        };
        self.states.lock().insert(name.clone(), state);
        Ok(())
    }

    async fn stop(&self, name: &ComponentName) -> Result<(), String> {
        self.states.lock().insert(name.clone(), ServiceState::Finished);
        Ok(())
    }

    async fn remove(&self, name: &ComponentName) -> Result<(), String> {
        self.states.lock().remove(name);
        Ok(())
    }

    fn current_state(&self, name: &ComponentName) -> ServiceState {
        self.states.lock().get(name).copied().unwrap_or(ServiceState::New)
    }

    async fn wait_until_settled(&self, name: &ComponentName, _deadline: Duration) -> ServiceState {
        self.current_state(name)
    }

    async fn run_bootstrap_stage(&self, name: &ComponentName, _stage: &LifecycleStage) -> BootstrapOutcome {
        if self.restart_on_bootstrap.contains(name) {
            BootstrapOutcome::RestartRequested
        } else {
            BootstrapOutcome::Completed
        }
    }
}

/// Build a fixture store rooted at a fresh temp directory, backed by
/// `source`. Returned alongside the `TempDir` so the caller keeps it alive
/// for the store's lifetime.
#[must_use]
pub fn fixture_store(
    source: Arc<FakeArtifactSource>,
) -> (tempfile::TempDir, ridgeline_store::ComponentStore<FakeArtifactSource>) {
    let dir = tempfile::TempDir::new().expect("creating fixture store tempdir");
    let store = ridgeline_store::ComponentStore::new(dir.path(), source);
    (dir, store)
}
