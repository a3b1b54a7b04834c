//! Phase 1 of the merge engine: diff the current and target
//! configuration trees into (added, removed, updated, unchanged) component
//! sets, and flag which updates are bootstrap-requiring.

use std::collections::BTreeSet;

use ridgeline_config::{ResolvedComponent, ResolvedServices};
use ridgeline_core::ComponentName;

const BOOTSTRAP_STAGE_NAME: &str = "bootstrap";

/// The result of diffing a current topology against a target one.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub added: BTreeSet<ComponentName>,
    pub removed: BTreeSet<ComponentName>,
    pub updated: BTreeSet<ComponentName>,
    pub unchanged: BTreeSet<ComponentName>,
    /// Subset of `updated` whose change requires a bootstrap stage run and
    /// a potential supervisor restart.
    pub bootstrap_requiring: BTreeSet<ComponentName>,
}

impl Plan {
    /// Every name the Apply phase must stop, in no particular order yet —
    /// ordering is resolved separately against the dependency graph (spec
    /// §5: "stop order is reverse topological").
    #[must_use]
    pub fn to_stop(&self) -> BTreeSet<ComponentName> {
        self.removed.union(&self.updated).cloned().collect()
    }

    /// Every name the Apply phase must (re)start.
    #[must_use]
    pub fn to_start(&self) -> BTreeSet<ComponentName> {
        self.added.union(&self.updated).cloned().collect()
    }
}

/// Compute the plan for moving from `current` to `target`.
#[must_use]
pub fn compute_plan(current: &ResolvedServices, target: &ResolvedServices) -> Plan {
    let mut plan = Plan::default();

    for name in current.components.keys() {
        if !target.components.contains_key(name) {
            plan.removed.insert(name.clone());
        }
    }

    for (name, target_component) in &target.components {
        match current.components.get(name) {
            None => {
                plan.added.insert(name.clone());
            }
            Some(current_component) => {
                if components_equivalent(current_component, target_component) {
                    plan.unchanged.insert(name.clone());
                } else {
                    plan.updated.insert(name.clone());
                    if is_bootstrap_requiring(current_component, target_component) {
                        plan.bootstrap_requiring.insert(name.clone());
                    }
                }
            }
        }
    }

    plan
}

fn components_equivalent(current: &ResolvedComponent, target: &ResolvedComponent) -> bool {
    current.version == target.version
        && current.configuration == target.configuration
        && lifecycle_scripts(current) == lifecycle_scripts(target)
}

fn lifecycle_scripts(component: &ResolvedComponent) -> Vec<(&str, &str)> {
    component
        .lifecycle
        .iter()
        .map(|stage| (stage.name.as_str(), stage.script.as_str()))
        .collect()
}

fn bootstrap_script(component: &ResolvedComponent) -> Option<&str> {
    component
        .lifecycle
        .iter()
        .find(|stage| stage.name == BOOTSTRAP_STAGE_NAME)
        .map(|stage| stage.script.as_str())
}

/// Bootstrap-requiring iff the target declares a bootstrap stage AND
/// (version changed OR the bootstrap stage's text changed).
fn is_bootstrap_requiring(current: &ResolvedComponent, target: &ResolvedComponent) -> bool {
    let Some(target_bootstrap) = bootstrap_script(target) else {
        return false;
    };
    let version_changed = current.version != target.version;
    let bootstrap_text_changed = bootstrap_script(current) != Some(target_bootstrap);
    version_changed || bootstrap_text_changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridgeline_core::{ConfigValue, LifecycleStage};
    use semver::Version;
    use std::collections::BTreeMap;

    fn name(s: &str) -> ComponentName {
        ComponentName::new(s).unwrap()
    }

    fn component(version: &str, stages: Vec<(&str, &str)>) -> ResolvedComponent {
        ResolvedComponent {
            version: Version::parse(version).unwrap(),
            dependencies: vec![],
            configuration: ConfigValue::object(),
            lifecycle: stages
                .into_iter()
                .map(|(n, s)| LifecycleStage {
                    name: n.to_string(),
                    script: s.to_string(),
                    update_check: None,
                    skip_if: None,
                })
                .collect(),
        }
    }

    fn services(components: Vec<(&str, ResolvedComponent)>) -> ResolvedServices {
        ResolvedServices {
            components: components.into_iter().map(|(n, c)| (name(n), c)).collect::<BTreeMap<_, _>>(),
            main: ridgeline_config::MainEntry { dependencies: vec![] },
        }
    }

    #[test]
    fn added_removed_unchanged_are_classified_correctly() {
        let current = services(vec![
            ("Stays", component("1.0.0", vec![])),
            ("Goes", component("1.0.0", vec![])),
        ]);
        let target = services(vec![
            ("Stays", component("1.0.0", vec![])),
            ("New", component("1.0.0", vec![])),
        ]);
        let plan = compute_plan(&current, &target);
        assert_eq!(plan.added, BTreeSet::from([name("New")]));
        assert_eq!(plan.removed, BTreeSet::from([name("Goes")]));
        assert_eq!(plan.unchanged, BTreeSet::from([name("Stays")]));
        assert!(plan.updated.is_empty());
    }

    #[test]
    fn version_bump_without_bootstrap_stage_is_updated_not_bootstrap_requiring() {
        let current = services(vec![("App", component("1.0.0", vec![("run", "start")]))]);
        let target = services(vec![("App", component("1.0.1", vec![("run", "start")]))]);
        let plan = compute_plan(&current, &target);
        assert_eq!(plan.updated, BTreeSet::from([name("App")]));
        assert!(plan.bootstrap_requiring.is_empty());
    }

    #[test]
    fn version_bump_with_bootstrap_stage_is_bootstrap_requiring() {
        let current = services(vec![("App", component("1.0.0", vec![("bootstrap", "migrate-v1")]))]);
        let target = services(vec![("App", component("2.0.0", vec![("bootstrap", "migrate-v1")]))]);
        let plan = compute_plan(&current, &target);
        assert!(plan.bootstrap_requiring.contains(&name("App")));
    }

    #[test]
    fn same_version_but_changed_bootstrap_text_is_bootstrap_requiring() {
        let current = services(vec![("App", component("1.0.0", vec![("bootstrap", "migrate-v1")]))]);
        let target = services(vec![("App", component("1.0.0", vec![("bootstrap", "migrate-v2")]))]);
        let plan = compute_plan(&current, &target);
        assert!(plan.bootstrap_requiring.contains(&name("App")));
    }

    #[test]
    fn same_version_and_same_bootstrap_text_is_not_bootstrap_requiring() {
        let current = services(vec![("App", component("1.0.0", vec![("bootstrap", "migrate-v1"), ("run", "a")]))]);
        let target = services(vec![("App", component("1.0.0", vec![("bootstrap", "migrate-v1"), ("run", "b")]))]);
        let plan = compute_plan(&current, &target);
        assert!(plan.updated.contains(&name("App")));
        assert!(plan.bootstrap_requiring.is_empty());
    }
}
