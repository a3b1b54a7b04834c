//! Topological ordering over a resolved dependency assignment, used by
//! `ridgeline-lifecycle` to compute stop (reverse) and start (forward)
//! order when applying a deployment.

use ahash::AHashMap;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use ridgeline_core::{ComponentName, ComponentRecipe};

/// A dependency DAG over a resolved set of components. Edges point from a
/// component to each of its declared dependencies.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<ComponentName, ()>,
    index_of: AHashMap<ComponentName, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from every recipe in the resolved assignment.
    /// Dependencies naming a component outside the assignment (never
    /// expected post-resolution, but tolerated defensively) are skipped
    /// rather than panicking.
    #[must_use]
    pub fn build(recipes: &AHashMap<ComponentName, ComponentRecipe>) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = AHashMap::new();
        for name in recipes.keys() {
            index_of.insert(name.clone(), graph.add_node(name.clone()));
        }
        for (name, recipe) in recipes {
            let from = index_of[name];
            for dep_name in recipe.component_dependencies.keys() {
                if let Some(&to) = index_of.get(dep_name) {
                    graph.add_edge(from, to, ());
                }
            }
        }
        Self { graph, index_of }
    }

    /// Build the graph directly from a name-to-dependencies map, for
    /// callers that already have a resolved component tree (e.g. the
    /// orchestrator diffing two already-interpolated topologies) and would
    /// otherwise have to reconstruct recipes just to call [`Self::build`].
    #[must_use]
    pub fn from_edges(edges: &AHashMap<ComponentName, Vec<ComponentName>>) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = AHashMap::new();
        for name in edges.keys() {
            index_of.insert(name.clone(), graph.add_node(name.clone()));
        }
        for (name, deps) in edges {
            let from = index_of[name];
            for dep_name in deps {
                if let Some(&to) = index_of.get(dep_name) {
                    graph.add_edge(from, to, ());
                }
            }
        }
        Self { graph, index_of }
    }

    /// Forward-dependency order: dependencies start before their
    /// dependents. `None` if the graph contains a cycle (should not occur
    /// post-resolution since the resolver already rejects cycles).
    #[must_use]
    pub fn start_order(&self) -> Option<Vec<ComponentName>> {
        // toposort visits a node only after all its *incoming* edges are
        // visited; our edges point dependent -> dependency, so the raw
        // toposort order is dependency-first only once reversed.
        let order = toposort(&self.graph, None).ok()?;
        let mut order: Vec<ComponentName> = order.into_iter().map(|idx| self.graph[idx].clone()).collect();
        order.reverse();
        Some(order)
    }

    /// Reverse-dependency order for stopping: dependents stop before their
    /// dependencies.
    #[must_use]
    pub fn stop_order(&self) -> Option<Vec<ComponentName>> {
        let mut order = self.start_order()?;
        order.reverse();
        Some(order)
    }

    #[must_use]
    pub fn contains(&self, name: &ComponentName) -> bool {
        self.index_of.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridgeline_core::{ComponentType, ConfigValue, DependencyKind, DependencyRequirement, VersionConstraint};
    use semver::Version;
    use std::collections::BTreeMap;

    fn recipe(name: &str, deps: &[&str]) -> (ComponentName, ComponentRecipe) {
        let mut component_dependencies = BTreeMap::new();
        for dep in deps {
            component_dependencies.insert(
                ComponentName::new(*dep).unwrap(),
                DependencyRequirement {
                    version_requirement: VersionConstraint::any(),
                    dependency_kind: DependencyKind::Hard,
                },
            );
        }
        let n = ComponentName::new(name).unwrap();
        (
            n.clone(),
            ComponentRecipe {
                component_name: n,
                component_version: Version::parse("1.0.0").unwrap(),
                component_type: ComponentType::Generic,
                default_configuration: ConfigValue::object(),
                component_dependencies,
                manifests: vec![],
            },
        )
    }

    #[test]
    fn start_order_places_dependencies_before_dependents() {
        let mut recipes = AHashMap::new();
        let (n, r) = recipe("App", &["Lib"]);
        recipes.insert(n, r);
        let (n, r) = recipe("Lib", &[]);
        recipes.insert(n, r);

        let graph = DependencyGraph::build(&recipes);
        let order = graph.start_order().unwrap();
        let lib_pos = order.iter().position(|n| n.as_str() == "Lib").unwrap();
        let app_pos = order.iter().position(|n| n.as_str() == "App").unwrap();
        assert!(lib_pos < app_pos);
    }

    #[test]
    fn stop_order_is_reverse_of_start_order() {
        let mut recipes = AHashMap::new();
        let (n, r) = recipe("App", &["Lib"]);
        recipes.insert(n, r);
        let (n, r) = recipe("Lib", &[]);
        recipes.insert(n, r);

        let graph = DependencyGraph::build(&recipes);
        let start = graph.start_order().unwrap();
        let stop = graph.stop_order().unwrap();
        assert_eq!(start, stop.into_iter().rev().collect::<Vec<_>>());
    }

    #[test]
    fn from_edges_matches_build_ordering() {
        let mut edges = AHashMap::new();
        edges.insert(ComponentName::new("App").unwrap(), vec![ComponentName::new("Lib").unwrap()]);
        edges.insert(ComponentName::new("Lib").unwrap(), vec![]);

        let graph = DependencyGraph::from_edges(&edges);
        let order = graph.start_order().unwrap();
        let lib_pos = order.iter().position(|n| n.as_str() == "Lib").unwrap();
        let app_pos = order.iter().position(|n| n.as_str() == "App").unwrap();
        assert!(lib_pos < app_pos);
    }
}
