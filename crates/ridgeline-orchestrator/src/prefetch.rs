//! Materializes a [`LocalCandidates`] for the resolver by walking the
//! dependency frontier outward from a deployment's root names, fetching
//! through the component store as it goes: enumerating locally available
//! versions and, on a miss, triggering a download through the artifact
//! collaborator.
//!
//! Resolution itself stays synchronous (`ridgeline-resolver`'s own design);
//! this module does the async legwork first so `resolve` only ever touches
//! already-materialized recipes.

use std::collections::VecDeque;

use ahash::AHashSet;
use ridgeline_core::{ComponentIdentifier, ComponentName, Error, Result};
use ridgeline_fetch::ArtifactSource;
use ridgeline_resolver::LocalCandidates;
use ridgeline_store::ComponentStore;
use semver::Version;
use tracing::{debug, warn};

/// Cap on distinct versions fetched per component name during prefetch,
/// bounding the work a single deployment can trigger against a name with
/// an unbounded release history.
const MAX_VERSIONS_PER_NAME: usize = 10;

/// Walk outward from `roots`, fetching every name's candidate recipes (up
/// to [`MAX_VERSIONS_PER_NAME`] each) and following their declared
/// dependencies, until the frontier is exhausted.
pub async fn prefetch_candidates<S: ArtifactSource>(
    roots: &[ComponentName],
    store: &ComponentStore<S>,
    artifact_source: &S,
) -> Result<LocalCandidates> {
    let mut candidates = LocalCandidates::new();
    let mut visited: AHashSet<ComponentName> = AHashSet::new();
    let mut frontier: VecDeque<ComponentName> = roots.iter().cloned().collect();

    while let Some(name) = frontier.pop_front() {
        if !visited.insert(name.clone()) {
            continue;
        }

        let mut versions: Vec<Version> = store.local_versions(&name);
        if versions.is_empty() {
            versions = artifact_source.list_remote_versions(&name).await;
        }
        versions.sort_by(|a, b| b.cmp(a));
        versions.dedup();

        if versions.len() > MAX_VERSIONS_PER_NAME {
            warn!(%name, available = versions.len(), cap = MAX_VERSIONS_PER_NAME, "truncating candidate versions");
            versions.truncate(MAX_VERSIONS_PER_NAME);
        }
        if versions.is_empty() {
            debug!(%name, "no candidate versions found locally or remotely");
            continue;
        }

        for version in versions {
            let id = ComponentIdentifier::new(name.clone(), version.clone());
            let recipe = match store.ensure_installed(&id).await {
                Ok(recipe) => recipe,
                Err(error) => {
                    warn!(%name, %version, %error, "candidate fetch failed, excluding from resolution");
                    continue;
                }
            };
            for dep_name in recipe.component_dependencies.keys() {
                if !visited.contains(dep_name) {
                    frontier.push_back(dep_name.clone());
                }
            }
            candidates.add(recipe);
        }
    }

    Ok(candidates)
}

/// Ensure every resolved assignment actually has its recipe and artifacts
/// installed (most were already fetched during prefetch, but a resolution
/// can legitimately settle on a version prefetch never tried if it was the
/// only one satisfying a late-discovered requirement).
pub async fn ensure_resolution_installed<S: ArtifactSource>(
    assignments: &std::collections::BTreeMap<ComponentName, Version>,
    store: &ComponentStore<S>,
) -> Result<std::collections::BTreeMap<ComponentName, ridgeline_core::ComponentRecipe>> {
    let mut recipes = std::collections::BTreeMap::new();
    for (name, version) in assignments {
        let id = ComponentIdentifier::new(name.clone(), version.clone());
        let recipe = store.ensure_installed(&id).await.map_err(|e| match e {
            Error::RecipeNotFound { .. } | Error::ArtifactDownloadFailed { .. } | Error::DigestMismatch { .. } => e,
            other => other,
        })?;
        recipes.insert(name.clone(), recipe);
    }
    Ok(recipes)
}
