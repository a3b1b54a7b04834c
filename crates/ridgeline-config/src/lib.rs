//! Configuration resolution: RESET/MERGE application and namespace-scoped
//! string interpolation with dependency-scoped visibility.

mod interpolate;
mod merge;
mod reset;

pub use interpolate::{interpolate, ComponentView, InterpolationContext};
pub use merge::resolve_configuration;
pub use reset::apply_reset;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ridgeline_core::{ComponentName, ComponentRecipe, ConfigValue, ConfigurationUpdate, LifecycleStage};
use serde::{Deserialize, Serialize};

/// The conventional built-in dependency names every resolved topology's
/// synthetic `main` entry depends on in addition to the deployment's own
/// root components — the supervisor's own auto-start built-ins.
pub const BUILTIN_AUTOSTART_COMPONENTS: &[&str] = &["DeploymentService"];

/// One component's fully resolved entry in the services tree:
/// `{lifecycle, dependencies, version, configuration, parameters}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedComponent {
    pub version: semver::Version,
    pub dependencies: Vec<ComponentName>,
    pub configuration: ConfigValue,
    /// Lifecycle stages with every placeholder interpolated.
    pub lifecycle: Vec<LifecycleStage>,
}

/// The synthetic `main` entry: depends on every root component plus the
/// supervisor's built-in auto-start services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainEntry {
    pub dependencies: Vec<ComponentName>,
}

/// The full output of configuration resolution: one entry per component
/// plus the synthetic `main` entry. Serializable so a bootstrap-requiring
/// deployment's target tree can be persisted across a supervisor restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedServices {
    pub components: BTreeMap<ComponentName, ResolvedComponent>,
    pub main: MainEntry,
}

/// Everything needed to resolve one component's configuration and
/// interpolate its lifecycle, gathered by the caller (the orchestrator,
/// which already has the component store and resolver results in hand).
pub struct ComponentInput<'a> {
    pub name: ComponentName,
    pub recipe: &'a ComponentRecipe,
    pub persisted_configuration: Option<&'a ConfigValue>,
    pub configuration_update: Option<&'a ConfigurationUpdate>,
    pub artifact_path: Option<PathBuf>,
    pub artifact_decompressed_path: Option<PathBuf>,
    /// The manifest-selected lifecycle stages for the running platform
    /// (already chosen by `ridgeline-store`'s platform matching).
    pub lifecycle: Vec<LifecycleStage>,
}

/// Resolve the configuration and interpolate the lifecycle for every
/// component in `inputs`, producing the tree the lifecycle merger
/// applies. `root_components` seeds the synthetic `main` entry's
/// dependency list.
#[must_use]
pub fn resolve_services(
    inputs: Vec<ComponentInput<'_>>,
    root_components: &[ComponentName],
    kernel_root_path: &Path,
) -> ResolvedServices {
    // Pass 1: resolve configuration for every component (no interpolation
    // yet — interpolation needs every component's *resolved* configuration
    // available for cross-component lookups).
    let mut configurations = BTreeMap::new();
    let mut dependencies_by_name = BTreeMap::new();
    let mut artifact_paths = BTreeMap::new();
    let mut versions = BTreeMap::new();
    let mut lifecycles = BTreeMap::new();

    for input in &inputs {
        let resolved = resolve_configuration(
            &input.recipe.default_configuration,
            input.persisted_configuration,
            input.configuration_update,
        );
        configurations.insert(input.name.clone(), resolved);
        dependencies_by_name.insert(
            input.name.clone(),
            input.recipe.component_dependencies.keys().cloned().collect::<Vec<_>>(),
        );
        artifact_paths.insert(
            input.name.clone(),
            (input.artifact_path.clone(), input.artifact_decompressed_path.clone()),
        );
        versions.insert(input.name.clone(), input.recipe.component_version.clone());
        lifecycles.insert(input.name.clone(), input.lifecycle.clone());
    }

    // Pass 2: build the interpolation context views and interpolate.
    let mut components = BTreeMap::new();
    for input in &inputs {
        let views: BTreeMap<ComponentName, ComponentView<'_>> = inputs
            .iter()
            .map(|other| {
                let (path, decompressed) = &artifact_paths[&other.name];
                (
                    other.name.clone(),
                    ComponentView {
                        name: &other.name,
                        configuration: &configurations[&other.name],
                        artifact_path: path.as_deref(),
                        artifact_decompressed_path: decompressed.as_deref(),
                        dependencies: &dependencies_by_name[&other.name],
                    },
                )
            })
            .collect();
        let ctx = InterpolationContext {
            components: views,
            kernel_root_path,
        };
        let source = ctx.components[&input.name].clone();

        let interpolated_lifecycle = lifecycles[&input.name]
            .iter()
            .map(|stage| LifecycleStage {
                name: stage.name.clone(),
                script: interpolate(&stage.script, &source, &ctx),
                update_check: stage.update_check.clone(),
                skip_if: stage.skip_if.clone(),
            })
            .collect();

        components.insert(
            input.name.clone(),
            ResolvedComponent {
                version: versions[&input.name].clone(),
                dependencies: dependencies_by_name[&input.name].clone(),
                configuration: configurations[&input.name].clone(),
                lifecycle: interpolated_lifecycle,
            },
        );
    }

    let mut main_dependencies: Vec<ComponentName> = root_components.to_vec();
    for builtin in BUILTIN_AUTOSTART_COMPONENTS {
        if let Ok(name) = ComponentName::new(*builtin) {
            if !main_dependencies.contains(&name) {
                main_dependencies.push(name);
            }
        }
    }
    main_dependencies.sort();
    main_dependencies.dedup();

    ResolvedServices {
        components,
        main: MainEntry {
            dependencies: main_dependencies,
        },
    }
}
