//! Handlers for the local IPC surface's component-scoped requests. The
//! socket transport these would normally arrive over lives outside this
//! crate; these functions are the in-process seam a transport layer — or,
//! in this workspace, `ridgeline-cli` driving the daemon in-process in
//! tests — calls directly.

use ridgeline_core::ComponentName;
use ridgeline_fetch::ArtifactSource;
use ridgeline_ipc::{
    CommandOutcome, ComponentDetails, GetComponentDetails, IpcError, ListComponents,
    RestartComponent, StopComponent, UpdateRecipesAndArtifacts,
};
use ridgeline_lifecycle::ServiceSupervisor;
use ridgeline_orchestrator::SupervisorContext;
use ridgeline_store::ComponentStore;
use tracing::warn;

use crate::local_source::{discover_recipes, LocalFilesystemSource};

pub fn get_component_details<S: ArtifactSource, V: ServiceSupervisor>(
    ctx: &SupervisorContext<S, V>,
    request: &GetComponentDetails,
) -> Result<ComponentDetails, IpcError> {
    let component = ctx
        .current
        .components
        .get(&request.name)
        .ok_or_else(|| IpcError::UnknownComponent(request.name.to_string()))?;
    Ok(ComponentDetails {
        name: request.name.clone(),
        version: component.version.clone(),
        state: ctx.supervisor.current_state(&request.name),
        configuration: component.configuration.clone(),
    })
}

/// `ListComponents() -> all non-main components` — the synthetic `main`
/// entry lives in `ResolvedServices::main`, never in `components`, so no
/// filtering is needed here.
pub fn list_components<S: ArtifactSource, V: ServiceSupervisor>(
    ctx: &SupervisorContext<S, V>,
    _request: &ListComponents,
) -> Vec<ComponentDetails> {
    ctx.current
        .components
        .iter()
        .map(|(name, component)| ComponentDetails {
            name: name.clone(),
            version: component.version.clone(),
            state: ctx.supervisor.current_state(name),
            configuration: component.configuration.clone(),
        })
        .collect()
}

pub async fn restart_component<S: ArtifactSource, V: ServiceSupervisor>(
    ctx: &SupervisorContext<S, V>,
    request: &RestartComponent,
) -> Result<CommandOutcome, IpcError> {
    require_known(ctx, &request.name)?;
    let stopped = ctx.supervisor.stop(&request.name).await;
    let started = ctx.supervisor.start(&request.name).await;
    Ok(outcome_of(stopped.and(started)))
}

pub async fn stop_component<S: ArtifactSource, V: ServiceSupervisor>(
    ctx: &SupervisorContext<S, V>,
    request: &StopComponent,
) -> Result<CommandOutcome, IpcError> {
    require_known(ctx, &request.name)?;
    Ok(outcome_of(ctx.supervisor.stop(&request.name).await))
}

fn require_known<S: ArtifactSource, V: ServiceSupervisor>(
    ctx: &SupervisorContext<S, V>,
    name: &ComponentName,
) -> Result<(), IpcError> {
    if ctx.current.components.contains_key(name) {
        Ok(())
    } else {
        Err(IpcError::UnknownComponent(name.to_string()))
    }
}

fn outcome_of(result: Result<(), String>) -> CommandOutcome {
    match result {
        Ok(()) => CommandOutcome::Succeeded,
        Err(message) => {
            warn!(%message, "component command failed");
            CommandOutcome::Failed
        }
    }
}

/// `UpdateRecipesAndArtifacts(recipeDir, artifactDir) -> preloads the
/// store`: every recipe found under `recipeDir` is fetched (from a source
/// scoped to the two given directories) and installed, so a subsequent
/// deployment resolves it without needing the external artifact
/// collaborator at all.
pub async fn update_recipes_and_artifacts(
    root: &std::path::Path,
    request: &UpdateRecipesAndArtifacts,
) -> Result<usize, IpcError> {
    let source = std::sync::Arc::new(LocalFilesystemSource::new(
        request.recipe_dir.clone(),
        request.artifact_dir.clone(),
    ));
    let store = ComponentStore::new(root, source);
    let mut installed = 0;
    for (name, version) in discover_recipes(&request.recipe_dir) {
        let id = ridgeline_core::ComponentIdentifier::new(name, version);
        store.ensure_installed(&id).await.map_err(IpcError::from)?;
        installed += 1;
    }
    Ok(installed)
}
