//! Dependency resolution across deployment groups with version constraints.
//!
//! Given the union of every group's root components plus a new
//! deployment's roots, [`resolve`] produces a concrete, acyclic assignment
//! `name -> version` satisfying every declared requirement, backtracking
//! over candidates ordered highest-version-first.

mod candidates;
mod graph;

pub use candidates::{CandidateSource, LocalCandidates};
pub use graph::DependencyGraph;

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use ridgeline_core::{ComponentName, ComponentRecipe, DependencyKind, VersionConstraint};
use semver::Version;
use tracing::{trace, warn};

/// A root requirement contributed either by the device's existing
/// group-to-roots map or by the new deployment document.
#[derive(Debug, Clone)]
pub struct RootRequirement {
    pub name: ComponentName,
    pub requirement: VersionConstraint,
}

/// The result of a successful resolution: every component that must be
/// installed and running, at a concrete version.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub assignments: BTreeMap<ComponentName, Version>,
}

/// Resolution failed: `name`'s active requirements have no common
/// satisfying version among any reachable candidate.
#[derive(Debug, Clone, thiserror::Error)]
#[error("dependency conflict on '{name}': {conflicting:?}")]
pub struct UnresolvedConflict {
    pub name: ComponentName,
    pub conflicting: Vec<String>,
}

impl From<UnresolvedConflict> for ridgeline_core::Error {
    fn from(e: UnresolvedConflict) -> Self {
        ridgeline_core::Error::DependencyConflict {
            name: e.name.to_string(),
            conflicting: e.conflicting,
        }
    }
}

/// Resolve `roots` against the candidates `source` can enumerate,
/// preferring `running` versions as the tie-break before falling back to
/// highest-semver.
///
/// Each recipe is loaded lazily through `source` the first time a
/// candidate is considered, so unreachable branches of the search never
/// trigger a remote lookup.
pub fn resolve(
    roots: &[RootRequirement],
    running: &AHashMap<ComponentName, Version>,
    source: &impl CandidateSource,
) -> Result<Resolution, UnresolvedConflict> {
    let mut requirements: AHashMap<ComponentName, Vec<VersionConstraint>> = AHashMap::new();
    for root in roots {
        requirements
            .entry(root.name.clone())
            .or_default()
            .push(root.requirement.clone());
    }

    let mut assignment = AHashMap::new();
    let mut stack: Vec<ComponentName> = requirements.keys().cloned().collect();
    stack.sort();
    let mut visiting = AHashSet::new();

    resolve_one(&mut stack, &mut requirements, &mut assignment, &mut visiting, running, source)?;

    let mut assignments = BTreeMap::new();
    for (name, version) in assignment {
        assignments.insert(name, version);
    }
    Ok(Resolution { assignments })
}

fn resolve_one(
    stack: &mut Vec<ComponentName>,
    requirements: &mut AHashMap<ComponentName, Vec<VersionConstraint>>,
    assignment: &mut AHashMap<ComponentName, Version>,
    visiting: &mut AHashSet<ComponentName>,
    running: &AHashMap<ComponentName, Version>,
    source: &impl CandidateSource,
) -> Result<(), UnresolvedConflict> {
    let Some(name) = stack.pop() else {
        return Ok(());
    };
    if assignment.contains_key(&name) {
        return resolve_one(stack, requirements, assignment, visiting, running, source);
    }
    if !visiting.insert(name.clone()) {
        // Already being resolved higher up this call chain; a cycle would
        // otherwise recurse forever. Recipes forming a dependency cycle is
        // itself a conflict.
        return Err(UnresolvedConflict {
            name: name.clone(),
            conflicting: vec!["cyclic dependency".to_string()],
        });
    }

    let active: Vec<VersionConstraint> = requirements.get(&name).cloned().unwrap_or_default();
    let candidates = ordered_candidates(&name, &active, running, source)?;

    let mut last_err = None;
    for candidate_version in candidates {
        let recipe = match source.recipe(&name, &candidate_version) {
            Some(recipe) => recipe,
            None => continue,
        };
        match try_candidate(
            &name,
            &candidate_version,
            &recipe,
            stack,
            requirements,
            assignment,
            visiting,
            running,
            source,
        ) {
            Ok(()) => {
                visiting.remove(&name);
                return resolve_one(stack, requirements, assignment, visiting, running, source);
            }
            Err(e) => last_err = Some(e),
        }
    }

    visiting.remove(&name);
    Err(last_err.unwrap_or_else(|| UnresolvedConflict {
        name: name.clone(),
        conflicting: active.iter().map(ToString::to_string).collect(),
    }))
}

#[allow(clippy::too_many_arguments)]
fn try_candidate(
    name: &ComponentName,
    version: &Version,
    recipe: &ComponentRecipe,
    stack: &mut Vec<ComponentName>,
    requirements: &mut AHashMap<ComponentName, Vec<VersionConstraint>>,
    assignment: &mut AHashMap<ComponentName, Version>,
    visiting: &mut AHashSet<ComponentName>,
    running: &AHashMap<ComponentName, Version>,
    source: &impl CandidateSource,
) -> Result<(), UnresolvedConflict> {
    assignment.insert(name.clone(), version.clone());

    let mut newly_pushed = Vec::new();
    for (dep_name, dep) in &recipe.component_dependencies {
        let reqs = requirements.entry(dep_name.clone()).or_default();
        reqs.push(dep.version_requirement.clone());
        if !assignment.contains_key(dep_name) {
            stack.push(dep_name.clone());
            newly_pushed.push(dep_name.clone());
        }
    }

    match resolve_one(stack, requirements, assignment, visiting, running, source) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Roll back: this candidate didn't pan out, undo the
            // requirement contributions and assignment so the next
            // candidate for `name` starts clean. HARD dependency failures
            // bubble the conflict up; SOFT dependency failures are pruned
            // from the requirement set and do not block `name` itself.
            for dep_name in &newly_pushed {
                stack.retain(|n| n != dep_name);
            }
            for (dep_name, dep) in &recipe.component_dependencies {
                if let Some(reqs) = requirements.get_mut(dep_name) {
                    if let Some(pos) = reqs.iter().position(|r| r == &dep.version_requirement) {
                        reqs.remove(pos);
                    }
                }
            }
            assignment.remove(name);
            if recipe
                .component_dependencies
                .values()
                .all(|d| d.dependency_kind == DependencyKind::Soft)
            {
                warn!(%name, %version, "soft dependency unsatisfiable, skipping candidate conservatively");
            }
            Err(e)
        }
    }
}

/// Candidates for `name` ordered by the resolver's tie-break: the
/// currently running version first (if it still satisfies every active
/// requirement), then strictly descending semver.
fn ordered_candidates(
    name: &ComponentName,
    active: &[VersionConstraint],
    running: &AHashMap<ComponentName, Version>,
    source: &impl CandidateSource,
) -> Result<Vec<Version>, UnresolvedConflict> {
    let mut versions = source.local_versions(name);
    if versions.is_empty() {
        versions = source.remote_versions(name);
    }
    if versions.is_empty() {
        return Err(UnresolvedConflict {
            name: name.clone(),
            conflicting: active.iter().map(ToString::to_string).collect(),
        });
    }

    let satisfying: Vec<Version> = versions
        .into_iter()
        .filter(|v| active.iter().all(|req| req.matches(v).unwrap_or(false)))
        .collect();
    if satisfying.is_empty() {
        return Err(UnresolvedConflict {
            name: name.clone(),
            conflicting: active.iter().map(ToString::to_string).collect(),
        });
    }

    let mut ordered = satisfying;
    ordered.sort_by(|a, b| b.cmp(a));
    if let Some(running_version) = running.get(name) {
        if let Some(pos) = ordered.iter().position(|v| v == running_version) {
            let v = ordered.remove(pos);
            ordered.insert(0, v);
        }
    }
    trace!(%name, candidates = ?ordered, "ordered candidates");
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridgeline_core::{ComponentType, ConfigValue, DependencyRequirement};
    use std::collections::BTreeMap;

    fn recipe(name: &str, version: &str, deps: &[(&str, &str, DependencyKind)]) -> ComponentRecipe {
        let mut component_dependencies = BTreeMap::new();
        for (dep_name, req, kind) in deps {
            component_dependencies.insert(
                ComponentName::new(*dep_name).unwrap(),
                DependencyRequirement {
                    version_requirement: VersionConstraint::new(*req).unwrap(),
                    dependency_kind: *kind,
                },
            );
        }
        ComponentRecipe {
            component_name: ComponentName::new(name).unwrap(),
            component_version: Version::parse(version).unwrap(),
            component_type: ComponentType::Generic,
            default_configuration: ConfigValue::object(),
            component_dependencies,
            manifests: vec![],
        }
    }

    fn req(name: &str, version_req: &str) -> RootRequirement {
        RootRequirement {
            name: ComponentName::new(name).unwrap(),
            requirement: VersionConstraint::new(version_req).unwrap(),
        }
    }

    #[test]
    fn resolves_simple_chain_highest_version_first() {
        let mut source = LocalCandidates::new();
        source.add(recipe("App", "1.0.0", &[("Lib", "^1.0.0", DependencyKind::Hard)]));
        source.add(recipe("Lib", "1.0.0", &[]));
        source.add(recipe("Lib", "1.2.0", &[]));

        let running = AHashMap::new();
        let resolution = resolve(&[req("App", "^1.0.0")], &running, &source).unwrap();
        assert_eq!(
            resolution.assignments.get(&ComponentName::new("Lib").unwrap()),
            Some(&Version::parse("1.2.0").unwrap())
        );
    }

    #[test]
    fn prefers_running_version_over_higher_candidate() {
        let mut source = LocalCandidates::new();
        source.add(recipe("Lib", "1.0.0", &[]));
        source.add(recipe("Lib", "1.2.0", &[]));

        let mut running = AHashMap::new();
        running.insert(ComponentName::new("Lib").unwrap(), Version::parse("1.0.0").unwrap());

        let resolution = resolve(&[req("Lib", "*")], &running, &source).unwrap();
        assert_eq!(
            resolution.assignments.get(&ComponentName::new("Lib").unwrap()),
            Some(&Version::parse("1.0.0").unwrap())
        );
    }

    #[test]
    fn conflicting_requirements_are_unresolved() {
        let mut source = LocalCandidates::new();
        source.add(recipe("Lib", "1.0.0", &[]));
        source.add(recipe("Lib", "2.0.0", &[]));

        let running = AHashMap::new();
        let err = resolve(
            &[req("Lib", "^1.0.0"), req("Lib", "^2.0.0")],
            &running,
            &source,
        )
        .unwrap_err();
        assert_eq!(err.name, ComponentName::new("Lib").unwrap());
    }

    #[test]
    fn backtracks_across_shared_dependency() {
        let mut source = LocalCandidates::new();
        source.add(recipe("A", "1.0.0", &[("Shared", "^2.0.0", DependencyKind::Hard)]));
        source.add(recipe("B", "1.0.0", &[("Shared", "^1.0.0", DependencyKind::Hard)]));
        source.add(recipe("Shared", "1.0.0", &[]));
        source.add(recipe("Shared", "2.0.0", &[]));

        let running = AHashMap::new();
        let err = resolve(&[req("A", "*"), req("B", "*")], &running, &source).unwrap_err();
        assert_eq!(err.name, ComponentName::new("Shared").unwrap());
    }

    #[test]
    fn missing_candidate_entirely_is_unresolved() {
        let source = LocalCandidates::new();
        let running = AHashMap::new();
        let err = resolve(&[req("Ghost", "*")], &running, &source).unwrap_err();
        assert_eq!(err.name, ComponentName::new("Ghost").unwrap());
    }
}
