//! Namespace-scoped string interpolation over lifecycle text.
//!
//! Two placeholder shapes are recognized:
//! - same-component: `{<namespace>:<key>}`
//! - cross-component: `{<componentName>:<namespace>:<key>}`
//!
//! Iteration is non-nested: each placeholder is resolved once against the
//! original text; a replacement's own text is never re-scanned for further
//! placeholders (spec: "a replacement is not re-scanned").

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use ridgeline_core::{ComponentName, ConfigValue};
use tracing::debug;

/// A fully resolved view of one component, as far as interpolation needs
/// to see it: its own configuration tree, its artifact paths, and which
/// names it is allowed to reach across components (its direct, declared
/// dependencies).
#[derive(Debug, Clone)]
pub struct ComponentView<'a> {
    pub name: &'a ComponentName,
    pub configuration: &'a ConfigValue,
    pub artifact_path: Option<&'a Path>,
    pub artifact_decompressed_path: Option<&'a Path>,
    pub dependencies: &'a [ComponentName],
}

/// Everything interpolation needs beyond the source component: the full
/// resolved set (to look up a cross-component target) and the supervisor
/// root path for the `kernel` namespace.
pub struct InterpolationContext<'a> {
    pub components: BTreeMap<ComponentName, ComponentView<'a>>,
    pub kernel_root_path: &'a Path,
}

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid regex"));

/// Interpolate every recognized placeholder in `text` against `source`
/// (the component the lifecycle stage belongs to) using `ctx`. Unresolvable
/// placeholders (unknown namespace, missing key, disallowed cross-component
/// target) are left in place verbatim and logged, per spec.
#[must_use]
pub fn interpolate(text: &str, source: &ComponentView<'_>, ctx: &InterpolationContext<'_>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let whole = caps.get(0).unwrap().as_str();
            let inner = &caps[1];
            resolve_placeholder(inner, source, ctx).unwrap_or_else(|| {
                debug!(placeholder = whole, component = %source.name, "leaving unresolved placeholder in place");
                whole.to_string()
            })
        })
        .into_owned()
}

fn resolve_placeholder(
    inner: &str,
    source: &ComponentView<'_>,
    ctx: &InterpolationContext<'_>,
) -> Option<String> {
    let parts: Vec<&str> = inner.splitn(3, ':').collect();
    match parts.as_slice() {
        [namespace, key] => resolve_same_component(namespace, key, source, ctx),
        [component, namespace, key] => {
            resolve_cross_component(component, namespace, key, source, ctx)
        }
        _ => None,
    }
}

fn resolve_same_component(
    namespace: &str,
    key: &str,
    source: &ComponentView<'_>,
    ctx: &InterpolationContext<'_>,
) -> Option<String> {
    match namespace {
        "configuration" => configuration_value(source.configuration, key),
        "artifacts" => artifact_value(source.artifact_path, source.artifact_decompressed_path, key),
        "kernel" if key == "rootPath" => Some(ctx.kernel_root_path.to_string_lossy().into_owned()),
        _ => None,
    }
}

fn resolve_cross_component(
    component: &str,
    namespace: &str,
    key: &str,
    source: &ComponentView<'_>,
    ctx: &InterpolationContext<'_>,
) -> Option<String> {
    let target_name = ComponentName::new(component).ok()?;
    let is_direct_dependency = source.dependencies.iter().any(|d| d == &target_name);
    if !is_direct_dependency {
        return None;
    }
    let target = ctx.components.get(&target_name)?;

    match namespace {
        "configuration" => configuration_value(target.configuration, key),
        "artifacts" => artifact_value(target.artifact_path, target.artifact_decompressed_path, key),
        _ => None,
    }
}

fn configuration_value(configuration: &ConfigValue, pointer: &str) -> Option<String> {
    let pointer = as_json_pointer(pointer);
    let value = configuration.pointer(&pointer)?;
    Some(match value {
        ConfigValue::String(s) => s.clone(),
        ConfigValue::Number(n) => n.to_string(),
        ConfigValue::Bool(b) => b.to_string(),
        ConfigValue::Null => "null".to_string(),
        ConfigValue::Array(_) | ConfigValue::Object(_) => value.to_string(),
    })
}

fn artifact_value(path: Option<&Path>, decompressed: Option<&Path>, key: &str) -> Option<String> {
    let path = match key {
        "path" => path,
        "decompressedPath" => decompressed,
        _ => None,
    }?;
    Some(path.to_string_lossy().into_owned())
}

/// Recipe authors write interpolation keys as bare paths (`/singleLevelKey`
/// or `singleLevelKey`); both are accepted as RFC-6901 pointers.
fn as_json_pointer(key: &str) -> String {
    if key.starts_with('/') || key.is_empty() {
        key.to_string()
    } else {
        format!("/{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config_value() -> ConfigValue {
        ConfigValue::Object(BTreeMap::from([
            ("singleLevelKey".to_string(), "updated value of singleLevelKey".into()),
            (
                "listKey".to_string(),
                ConfigValue::Array(vec!["item3".into()]),
            ),
        ]))
    }

    #[test]
    fn same_component_configuration_placeholder_resolves() {
        let name = ComponentName::new("App").unwrap();
        let configuration = config_value();
        let source = ComponentView {
            name: &name,
            configuration: &configuration,
            artifact_path: None,
            artifact_decompressed_path: None,
            dependencies: &[],
        };
        let kernel_root = PathBuf::from("/kernel");
        let ctx = InterpolationContext {
            components: BTreeMap::new(),
            kernel_root_path: &kernel_root,
        };

        let out = interpolate("Value for /singleLevelKey: {configuration:/singleLevelKey}.", &source, &ctx);
        assert_eq!(out, "Value for /singleLevelKey: updated value of singleLevelKey.");

        let out = interpolate("Value for /listKey/0: {configuration:/listKey/0}.", &source, &ctx);
        assert_eq!(out, "Value for /listKey/0: item3.");
    }

    #[test]
    fn missing_configuration_key_leaves_placeholder_in_place() {
        let name = ComponentName::new("App").unwrap();
        let configuration = config_value();
        let source = ComponentView {
            name: &name,
            configuration: &configuration,
            artifact_path: None,
            artifact_decompressed_path: None,
            dependencies: &[],
        };
        let kernel_root = PathBuf::from("/kernel");
        let ctx = InterpolationContext {
            components: BTreeMap::new(),
            kernel_root_path: &kernel_root,
        };
        let out = interpolate("{configuration:/missing}", &source, &ctx);
        assert_eq!(out, "{configuration:/missing}");
    }

    #[test]
    fn cross_component_requires_direct_declared_dependency() {
        let name = ComponentName::new("App").unwrap();
        let dep_name = ComponentName::new("Dep").unwrap();
        let not_dep_name = ComponentName::new("NotDep").unwrap();
        let empty_config = ConfigValue::object();
        let dep_config = ConfigValue::Object(BTreeMap::from([(
            "k".to_string(),
            "v".into(),
        )]));

        let source = ComponentView {
            name: &name,
            configuration: &empty_config,
            artifact_path: None,
            artifact_decompressed_path: None,
            dependencies: std::slice::from_ref(&dep_name),
        };

        let mut components = BTreeMap::new();
        components.insert(
            dep_name.clone(),
            ComponentView {
                name: &dep_name,
                configuration: &dep_config,
                artifact_path: None,
                artifact_decompressed_path: None,
                dependencies: &[],
            },
        );
        components.insert(
            not_dep_name.clone(),
            ComponentView {
                name: &not_dep_name,
                configuration: &dep_config,
                artifact_path: None,
                artifact_decompressed_path: None,
                dependencies: &[],
            },
        );
        let kernel_root = PathBuf::from("/kernel");
        let ctx = InterpolationContext {
            components,
            kernel_root_path: &kernel_root,
        };

        let out = interpolate("{Dep:configuration:/k}", &source, &ctx);
        assert_eq!(out, "v");

        let out = interpolate("{NotDep:configuration:/k}", &source, &ctx);
        assert_eq!(out, "{NotDep:configuration:/k}");
    }

    #[test]
    fn unknown_namespace_left_in_place() {
        let name = ComponentName::new("App").unwrap();
        let configuration = ConfigValue::object();
        let source = ComponentView {
            name: &name,
            configuration: &configuration,
            artifact_path: None,
            artifact_decompressed_path: None,
            dependencies: &[],
        };
        let kernel_root = PathBuf::from("/kernel");
        let ctx = InterpolationContext {
            components: BTreeMap::new(),
            kernel_root_path: &kernel_root,
        };
        let out = interpolate("{bogus:key}", &source, &ctx);
        assert_eq!(out, "{bogus:key}");
    }

    #[test]
    fn kernel_root_path_resolves() {
        let name = ComponentName::new("App").unwrap();
        let configuration = ConfigValue::object();
        let source = ComponentView {
            name: &name,
            configuration: &configuration,
            artifact_path: None,
            artifact_decompressed_path: None,
            dependencies: &[],
        };
        let kernel_root = PathBuf::from("/opt/ridgeline");
        let ctx = InterpolationContext {
            components: BTreeMap::new(),
            kernel_root_path: &kernel_root,
        };
        let out = interpolate("{kernel:rootPath}", &source, &ctx);
        assert_eq!(out, "/opt/ridgeline");
    }

    #[test]
    fn is_not_re_scanned_after_replacement() {
        let name = ComponentName::new("App").unwrap();
        let configuration = ConfigValue::Object(BTreeMap::from([(
            "tricky".to_string(),
            "{configuration:/tricky}".into(),
        )]));
        let source = ComponentView {
            name: &name,
            configuration: &configuration,
            artifact_path: None,
            artifact_decompressed_path: None,
            dependencies: &[],
        };
        let kernel_root = PathBuf::from("/kernel");
        let ctx = InterpolationContext {
            components: BTreeMap::new(),
            kernel_root_path: &kernel_root,
        };
        let out = interpolate("{configuration:/tricky}", &source, &ctx);
        assert_eq!(out, "{configuration:/tricky}");
    }

    #[test]
    fn artifacts_namespace_resolves_paths() {
        let name = ComponentName::new("App").unwrap();
        let configuration = ConfigValue::object();
        let artifact_path = PathBuf::from("/store/artifacts/App/1.0.0");
        let source = ComponentView {
            name: &name,
            configuration: &configuration,
            artifact_path: Some(&artifact_path),
            artifact_decompressed_path: None,
            dependencies: &[],
        };
        let kernel_root = PathBuf::from("/kernel");
        let ctx = InterpolationContext {
            components: BTreeMap::new(),
            kernel_root_path: &kernel_root,
        };
        let out = interpolate("{artifacts:path}", &source, &ctx);
        assert_eq!(out, "/store/artifacts/App/1.0.0");
    }
}
