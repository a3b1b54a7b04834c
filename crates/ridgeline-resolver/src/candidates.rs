//! The resolver's view of available candidates: local cache first, and
//! only on a local miss does it ask the artifact collaborator for remote
//! candidates.

use ahash::AHashMap;
use ridgeline_core::{ComponentName, ComponentRecipe};
use semver::Version;

/// What the resolver needs from the component store: version enumeration
/// and recipe lookup, without depending on `ridgeline-store` directly (that
/// crate depends on `ridgeline-fetch`'s async transport; resolution itself
/// is synchronous backtracking and should stay that way).
pub trait CandidateSource {
    fn local_versions(&self, name: &ComponentName) -> Vec<Version>;
    fn remote_versions(&self, name: &ComponentName) -> Vec<Version>;
    fn recipe(&self, name: &ComponentName, version: &Version) -> Option<ComponentRecipe>;
}

/// An in-memory `CandidateSource`, used by tests and by callers who have
/// already materialized every reachable recipe (the orchestrator
/// pre-fetches recipes for root names and their already-known dependencies
/// before invoking the resolver).
#[derive(Debug, Default)]
pub struct LocalCandidates {
    recipes: AHashMap<ComponentName, AHashMap<Version, ComponentRecipe>>,
    remote: AHashMap<ComponentName, Vec<Version>>,
}

impl LocalCandidates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, recipe: ComponentRecipe) {
        self.recipes
            .entry(recipe.component_name.clone())
            .or_default()
            .insert(recipe.component_version.clone(), recipe);
    }

    /// Register a version as available only remotely (not yet cached).
    /// `recipe` must still be supplied via [`Self::add`] once "fetched" for
    /// the resolver to be able to recurse into its dependencies; tests that
    /// only probe unresolved-candidate behavior can skip it.
    pub fn add_remote_only(&mut self, name: ComponentName, version: Version) {
        self.remote.entry(name).or_default().push(version);
    }
}

impl CandidateSource for LocalCandidates {
    fn local_versions(&self, name: &ComponentName) -> Vec<Version> {
        self.recipes
            .get(name)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn remote_versions(&self, name: &ComponentName) -> Vec<Version> {
        self.remote.get(name).cloned().unwrap_or_default()
    }

    fn recipe(&self, name: &ComponentName, version: &Version) -> Option<ComponentRecipe> {
        self.recipes.get(name)?.get(version).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridgeline_core::{ComponentType, ConfigValue};
    use std::collections::BTreeMap;

    #[test]
    fn local_versions_reflects_added_recipes() {
        let mut source = LocalCandidates::new();
        let name = ComponentName::new("App").unwrap();
        source.add(ComponentRecipe {
            component_name: name.clone(),
            component_version: Version::parse("1.0.0").unwrap(),
            component_type: ComponentType::Generic,
            default_configuration: ConfigValue::object(),
            component_dependencies: BTreeMap::new(),
            manifests: vec![],
        });
        assert_eq!(source.local_versions(&name), vec![Version::parse("1.0.0").unwrap()]);
        assert!(source.remote_versions(&name).is_empty());
    }
}
