//! The supervisor context: one owned struct passed explicitly to
//! subsystems, owning the live topology, the persisted group-to-roots
//! map, and the collaborators every deployment
//! phase needs, and drives one deployment at a time through them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ahash::AHashMap;
use ridgeline_config::{ComponentInput, ResolvedServices};
use ridgeline_core::{
    ComponentIdentifier, ComponentName, ComponentRecipe, ConfigValue, DeploymentDocument, DeploymentStage, Error,
};
use ridgeline_fetch::ArtifactSource;
use ridgeline_lifecycle::{
    apply, compute_plan, run_bootstrap, ApplyOutcome, Cancellation, DeferralCoordinator, ServiceSupervisor,
};
use ridgeline_resolver::{resolve, DependencyGraph, RootRequirement};
use ridgeline_state::{DeploymentDirectoryManager, GroupToRootComponents, InProgressDeployment, RollbackSnapshot};
use ridgeline_store::ComponentStore;
use semver::Version;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::prefetch::{ensure_resolution_installed, prefetch_candidates};
use crate::result::{DeploymentResult, DeploymentStatus};

/// Everything a running deployment lane needs, owned in one place. Only
/// the orchestrator's task loop (`run_deployment`) ever mutates
/// `current`/`group_roots`/`persisted_configurations` — the
/// single-writer guarantee follows from `&mut self` alone, with no
/// internal locking needed.
pub struct SupervisorContext<S: ArtifactSource, V: ServiceSupervisor> {
    pub root: PathBuf,
    pub kernel_root_path: PathBuf,
    pub store: ComponentStore<S>,
    pub artifact_source: std::sync::Arc<S>,
    pub supervisor: V,
    pub group_roots: GroupToRootComponents,
    pub current: ResolvedServices,
    pub persisted_configurations: BTreeMap<ComponentName, ConfigValue>,
    pub deployment_dirs: DeploymentDirectoryManager,
}

impl<S: ArtifactSource, V: ServiceSupervisor> SupervisorContext<S, V> {
    pub fn new(root: PathBuf, store: ComponentStore<S>, artifact_source: std::sync::Arc<S>, supervisor: V) -> Self {
        let deployment_dirs = DeploymentDirectoryManager::new(&root);
        Self {
            kernel_root_path: root.clone(),
            store,
            artifact_source,
            supervisor,
            group_roots: GroupToRootComponents::default(),
            current: ResolvedServices {
                components: BTreeMap::new(),
                main: ridgeline_config::MainEntry { dependencies: vec![] },
            },
            persisted_configurations: BTreeMap::new(),
            deployment_dirs,
            root,
        }
    }

    fn running_versions(&self) -> AHashMap<ComponentName, Version> {
        self.current
            .components
            .iter()
            .map(|(name, component)| (name.clone(), component.version.clone()))
            .collect()
    }

    /// Run one deployment document to completion, returning its terminal
    /// [`DeploymentResult`]. `deployment_id` is the caller's configuration
    /// ARN analogue, used to key the scratch directory.
    pub async fn run_deployment(
        &mut self,
        document: &DeploymentDocument,
        deployment_id: &str,
        deadline: Instant,
        cancellation: &Cancellation,
    ) -> DeploymentResult {
        let root_names: Vec<ComponentName> = document.root_components.keys().cloned().collect();

        let root_requirements: Vec<RootRequirement> = self
            .group_roots
            .root_requirements_with_override(&document.group_name, &document.root_components)
            .into_iter()
            .map(|(name, requirement)| RootRequirement { name, requirement })
            .collect();

        let candidates = match prefetch_candidates(&root_names, &self.store, self.artifact_source.as_ref()).await {
            Ok(candidates) => candidates,
            Err(error) => return DeploymentResult::failed(deployment_id, DeploymentStatus::FailedNoStateChange, error.to_string()),
        };

        let resolution = match resolve(&root_requirements, &self.running_versions(), &candidates) {
            Ok(resolution) => resolution,
            Err(conflict) => {
                return DeploymentResult::failed(
                    deployment_id,
                    DeploymentStatus::FailedNoStateChange,
                    Error::from(conflict).to_string(),
                )
            }
        };

        let recipes = match ensure_resolution_installed(&resolution.assignments, &self.store).await {
            Ok(recipes) => recipes,
            Err(error) => return DeploymentResult::failed(deployment_id, DeploymentStatus::FailedNoStateChange, error.to_string()),
        };

        let target = self.resolve_target_services(&resolution.assignments, &recipes, document, &root_names);

        let plan = compute_plan(&self.current, &target);
        let graph = self.dependency_order(&self.current, &target);
        let stop_order = graph.stop_order().unwrap_or_default();
        let start_order = graph.start_order().unwrap_or_default();

        let deployment_dir = match self.deployment_dirs.create_if_not_exists(deployment_id) {
            Ok(dir) => dir,
            Err(error) => return DeploymentResult::failed(deployment_id, DeploymentStatus::FailedNoStateChange, error.to_string()),
        };

        let snapshot = RollbackSnapshot {
            configurations: self.persisted_configurations.clone(),
            group_to_root_components: self.group_roots.clone(),
            running_versions: self.running_versions().into_iter().collect(),
        };
        if let Err(error) = snapshot.save(&deployment_dir.snapshot_dir()) {
            return DeploymentResult::failed(deployment_id, DeploymentStatus::FailedNoStateChange, error.to_string());
        }

        // Checkpoint before phase 3: a cancellation requested before this
        // deployment even reached the update-check vote unwinds exactly
        // like one that lands mid-apply.
        if cancellation.is_cancelled() {
            return self.recover(document, deployment_id, target, Vec::new(), &deployment_dir, true).await;
        }

        let mut deferrals = DeferralCoordinator::new();
        for name in plan.to_stop().iter() {
            deferrals.notify(name, &document.component_update_policy.skip_notify_components);
        }
        let timeout = std::time::Duration::from_secs(u64::from(document.component_update_policy.timeout_seconds));
        let longest_deferral = deferrals.collect_votes(timeout).await;
        // Deferral is cooperative, not a veto: if any component defers and
        // the policy doesn't skip safety checks, the merge reschedules
        // after the largest requested interval, bounded by the overall
        // deadline, rather than proceeding immediately.
        if let Some(defer_for) = longest_deferral {
            if document.component_update_policy.skip_safety_check {
                info!(deployment_id, ?defer_for, "deferral requested but policy skips safety checks; proceeding");
            } else {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let reschedule_after = defer_for.min(remaining);
                info!(deployment_id, ?reschedule_after, "component deferred, rescheduling merge");
                tokio::select! {
                    () = tokio::time::sleep(reschedule_after) => {}
                    () = cancellation.wait_cancelled() => {}
                }
                if cancellation.is_cancelled() {
                    return self.recover(document, deployment_id, target, Vec::new(), &deployment_dir, true).await;
                }
            }
        }

        if !plan.bootstrap_requiring.is_empty() {
            let in_progress = InProgressDeployment {
                deployment_id: deployment_id.to_string(),
                stage: DeploymentStage::Bootstrap,
                document: document.clone(),
                target: target.clone(),
                assignments: resolution.assignments.clone(),
            };
            if let Err(error) = in_progress.save(&deployment_dir.bootstrap_dir()) {
                return DeploymentResult::failed(deployment_id, DeploymentStatus::FailedNoStateChange, error.to_string());
            }

            let bootstrap_outcome = run_bootstrap(&plan.bootstrap_requiring, &target, &self.supervisor).await;
            if bootstrap_outcome.restart_requested {
                let mut resumed = in_progress;
                resumed.stage = DeploymentStage::KernelActivation;
                if let Err(error) = resumed.save(&deployment_dir.bootstrap_dir()) {
                    warn!(deployment_id, %error, "failed to advance persisted bootstrap stage to KERNEL_ACTIVATION");
                }
                info!(deployment_id, "bootstrap stage requested a supervisor restart; pausing this deployment");
                return DeploymentResult::restart_pending(deployment_id);
            }
        }

        let outcome = apply(
            &plan,
            &target,
            &stop_order,
            &start_order,
            &self.supervisor,
            deadline,
            cancellation,
        )
        .await;

        match outcome {
            ApplyOutcome::Success => {
                self.commit(document, deployment_id, target, &resolution.assignments, &deployment_dir)
            }
            ApplyOutcome::Broken(broken) => {
                self.recover(document, deployment_id, target, broken.into_iter().collect(), &deployment_dir, false)
                    .await
            }
            ApplyOutcome::Cancelled => {
                self.recover(document, deployment_id, target, Vec::new(), &deployment_dir, true).await
            }
        }
    }

    /// Resume a bootstrap-requiring deployment that persisted
    /// `KERNEL_ACTIVATION` before the supervisor restart it requested:
    /// compare the post-restart topology (`self.current`, freshly
    /// rebuilt by the caller from whatever the supervisor reports on this
    /// process start) against the recorded target, finish applying
    /// it, and commit or roll back exactly as a same-pass deployment would.
    pub async fn resume_bootstrap_deployment(
        &mut self,
        in_progress: InProgressDeployment,
        deadline: Instant,
        cancellation: &Cancellation,
    ) -> DeploymentResult {
        let InProgressDeployment {
            deployment_id,
            document,
            target,
            assignments,
            ..
        } = in_progress;

        let deployment_dir = match self.deployment_dirs.create_if_not_exists(&deployment_id) {
            Ok(dir) => dir,
            Err(error) => return DeploymentResult::failed(&deployment_id, DeploymentStatus::FailedNoStateChange, error.to_string()),
        };

        let plan = compute_plan(&self.current, &target);
        let graph = self.dependency_order(&self.current, &target);
        let stop_order = graph.stop_order().unwrap_or_default();
        let start_order = graph.start_order().unwrap_or_default();

        info!(deployment_id, "resuming bootstrap-requiring deployment in KERNEL_ACTIVATION");
        let outcome = apply(
            &plan,
            &target,
            &stop_order,
            &start_order,
            &self.supervisor,
            deadline,
            cancellation,
        )
        .await;

        match outcome {
            ApplyOutcome::Success => self.commit(&document, &deployment_id, target, &assignments, &deployment_dir),
            ApplyOutcome::Broken(broken) => {
                self.recover(&document, &deployment_id, target, broken.into_iter().collect(), &deployment_dir, false)
                    .await
            }
            ApplyOutcome::Cancelled => {
                self.recover(&document, &deployment_id, target, Vec::new(), &deployment_dir, true).await
            }
        }
    }

    fn dependency_order(&self, current: &ResolvedServices, target: &ResolvedServices) -> DependencyGraph {
        let mut edges: AHashMap<ComponentName, Vec<ComponentName>> = AHashMap::new();
        for (name, component) in current.components.iter().chain(target.components.iter()) {
            edges.insert(name.clone(), component.dependencies.clone());
        }
        DependencyGraph::from_edges(&edges)
    }

    fn resolve_target_services(
        &self,
        assignments: &BTreeMap<ComponentName, Version>,
        recipes: &BTreeMap<ComponentName, ComponentRecipe>,
        document: &DeploymentDocument,
        root_names: &[ComponentName],
    ) -> ResolvedServices {
        let platform = ridgeline_core::Platform::current();
        let mut inputs = Vec::new();
        for name in assignments.keys() {
            let Some(recipe) = recipes.get(name) else { continue };
            let id = ComponentIdentifier::new(name.clone(), recipe.component_version.clone());
            let filters: Vec<_> = recipe.manifests.iter().map(|m| m.platform.clone()).collect();
            let lifecycle = ridgeline_core::platform::select_manifest(&filters, &platform)
                .map(|idx| recipe.manifests[idx].lifecycle.clone())
                .unwrap_or_default();
            let is_root = root_names.contains(name);
            inputs.push(ComponentInput {
                name: name.clone(),
                recipe,
                persisted_configuration: self.persisted_configurations.get(name),
                configuration_update: if is_root {
                    document.configuration_updates.get(name)
                } else {
                    None
                },
                artifact_path: Some(ridgeline_store::artifact_dir(&self.root, &id)),
                artifact_decompressed_path: Some(ridgeline_store::artifact_decompressed_dir(&self.root, &id)),
                lifecycle,
            });
        }
        ridgeline_config::resolve_services(inputs, root_names, &self.kernel_root_path)
    }

    fn commit(
        &mut self,
        document: &DeploymentDocument,
        deployment_id: &str,
        target: ResolvedServices,
        assignments: &BTreeMap<ComponentName, Version>,
        deployment_dir: &ridgeline_state::DeploymentDirectory,
    ) -> DeploymentResult {
        for (name, component) in &target.components {
            self.persisted_configurations.insert(name.clone(), component.configuration.clone());
        }
        self.group_roots.set_group(
            &document.group_name,
            document
                .root_components
                .keys()
                .filter_map(|name| assignments.get(name).map(|v| (name.clone(), v.clone())))
                .collect(),
        );
        self.current = target;

        let keep = self.keep_set();
        let removed = self.store.prune(&keep);
        info!(deployment_id, pruned = removed.len(), "deployment committed");

        if let Err(error) = self.deployment_dirs.remove(deployment_id) {
            warn!(deployment_id, %error, "failed to clean up deployment directory after commit");
        }
        let _ = deployment_dir;

        DeploymentResult::successful(deployment_id)
    }

    /// `forced_rollback` is set for a cancellation-triggered unwind: spec
    /// §4.4.2 requires cancellation before commit to unwind identically to
    /// `ROLLBACK` regardless of `failureHandlingPolicy`, whereas an
    /// ordinary Apply failure still respects `DO_NOTHING`.
    async fn recover(
        &mut self,
        document: &DeploymentDocument,
        deployment_id: &str,
        attempted_target: ResolvedServices,
        broken: Vec<ComponentName>,
        deployment_dir: &ridgeline_state::DeploymentDirectory,
        forced_rollback: bool,
    ) -> DeploymentResult {
        if !forced_rollback && document.failure_handling_policy == ridgeline_core::FailureHandlingPolicy::DoNothing {
            return DeploymentResult {
                deployment_id: deployment_id.to_string(),
                status: DeploymentStatus::FailedRollbackNotRequested,
                broken_components: broken,
                message: Some("failure handling policy is DO_NOTHING; leaving partially applied state".to_string()),
            };
        }

        let snapshot = match RollbackSnapshot::load(&deployment_dir.snapshot_dir()) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                return DeploymentResult {
                    deployment_id: deployment_id.to_string(),
                    status: DeploymentStatus::FailedUnableToRollback,
                    broken_components: broken,
                    message: Some("no rollback snapshot on disk".to_string()),
                }
            }
            Err(error) => {
                return DeploymentResult {
                    deployment_id: deployment_id.to_string(),
                    status: DeploymentStatus::FailedUnableToRollback,
                    broken_components: broken,
                    message: Some(error.to_string()),
                }
            }
        };

        // The actual running processes are, at this point, wherever the
        // interrupted Apply left them: somewhere between `self.current`
        // (the pre-deployment topology, never overwritten since we only
        // commit on success) and `attempted_target`. Diffing from the
        // attempted target back to the pre-deployment topology and
        // re-applying restores the device to its pre-deployment state.
        let previous = self.current.clone();
        let plan = compute_plan(&attempted_target, &previous);
        let graph = self.dependency_order(&attempted_target, &previous);
        let stop_order = graph.stop_order().unwrap_or_default();
        let start_order = graph.start_order().unwrap_or_default();
        let (_handle, cancellation) = Cancellation::new();

        let outcome = apply(
            &plan,
            &previous,
            &stop_order,
            &start_order,
            &self.supervisor,
            Instant::now() + ridgeline_lifecycle::default_settle_timeout(),
            &cancellation,
        )
        .await;

        self.persisted_configurations = snapshot.configurations;
        self.group_roots = snapshot.group_to_root_components;

        let _ = self.deployment_dirs.remove(deployment_id);

        match outcome {
            ApplyOutcome::Success => DeploymentResult {
                deployment_id: deployment_id.to_string(),
                status: DeploymentStatus::FailedRollbackComplete,
                broken_components: broken,
                message: None,
            },
            _ => DeploymentResult {
                deployment_id: deployment_id.to_string(),
                status: DeploymentStatus::FailedUnableToRollback,
                broken_components: broken,
                message: Some("rollback apply did not settle cleanly".to_string()),
            },
        }
    }

    fn keep_set(&self) -> std::collections::HashMap<ComponentName, std::collections::HashSet<Version>> {
        let mut keep: std::collections::HashMap<ComponentName, std::collections::HashSet<Version>> = std::collections::HashMap::new();
        for (name, component) in &self.current.components {
            keep.entry(name.clone()).or_default().insert(component.version.clone());
        }
        for roots in self.group_roots.groups.values() {
            for (name, version) in roots {
                keep.entry(name.clone()).or_default().insert(version.clone());
            }
        }
        keep
    }
}
