//! The persisted group-to-roots map: updated on deployment success only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ridgeline_core::{ComponentName, Error, Result, VersionConstraint};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::atomic::write_atomically;

/// `groupName -> {componentName -> version}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupToRootComponents {
    pub groups: BTreeMap<String, BTreeMap<ComponentName, Version>>,
}

impl GroupToRootComponents {
    /// Load from `path`, treating a missing file as an empty map (first
    /// deployment ever on this device) and a corrupt file as fatal (spec
    /// §7: "corruption of the persisted configuration store detected at
    /// load — refuse to start").
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => sonic_rs::from_slice(&bytes)
                .map_err(|e| Error::ConfigStore(format!("corrupt group-to-roots store at {}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = sonic_rs::to_string(self)
            .map_err(|e| Error::ConfigStore(e.to_string()))?
            .into_bytes();
        write_atomically(path, &bytes)
    }

    /// Replace one group's root map, as a deployment commits (spec: "the
    /// group-to-roots store and the live running set are updated together
    /// or not at all").
    pub fn set_group(&mut self, group_name: &str, roots: BTreeMap<ComponentName, Version>) {
        self.groups.insert(group_name.to_string(), roots);
    }

    /// The union across every group: the device-wide set of root
    /// components.
    #[must_use]
    pub fn union_roots(&self) -> BTreeMap<ComponentName, Version> {
        let mut union = BTreeMap::new();
        for roots in self.groups.values() {
            for (name, version) in roots {
                union.insert(name.clone(), version.clone());
            }
        }
        union
    }

    /// Build the root requirement list the resolver consumes: the union of
    /// every existing group's roots (as exact-version requirements, since
    /// an already-resolved root should not silently drift) plus the new
    /// deployment's own requested roots for `incoming_group`, which
    /// override that group's previous entry.
    #[must_use]
    pub fn root_requirements_with_override(
        &self,
        incoming_group: &str,
        incoming_roots: &BTreeMap<ComponentName, VersionConstraint>,
    ) -> BTreeMap<ComponentName, VersionConstraint> {
        let mut merged = BTreeMap::new();
        for (group, roots) in &self.groups {
            if group == incoming_group {
                continue;
            }
            for (name, version) in roots {
                merged.insert(
                    name.clone(),
                    VersionConstraint::new(format!("={version}")).expect("exact requirement always parses"),
                );
            }
        }
        for (name, requirement) in incoming_roots {
            merged.insert(name.clone(), requirement.clone());
        }
        merged
    }
}

/// Conventional path for the persisted group-to-roots file under a
/// supervisor's root directory.
#[must_use]
pub fn group_roots_path(root: &Path) -> PathBuf {
    root.join("config").join("group-to-root-components.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn name(s: &str) -> ComponentName {
        ComponentName::new(s).unwrap()
    }
    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let loaded = GroupToRootComponents::load(&path).unwrap();
        assert!(loaded.groups.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roots.json");
        let mut state = GroupToRootComponents::default();
        state.set_group("fleet-a", BTreeMap::from([(name("App"), v("1.0.0"))]));
        state.save(&path).unwrap();

        let loaded = GroupToRootComponents::load(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn corrupt_file_is_reported_as_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roots.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(GroupToRootComponents::load(&path).is_err());
    }

    #[test]
    fn union_roots_merges_across_groups() {
        let mut state = GroupToRootComponents::default();
        state.set_group("a", BTreeMap::from([(name("X"), v("1.0.0"))]));
        state.set_group("b", BTreeMap::from([(name("Y"), v("2.0.0"))]));
        let union = state.union_roots();
        assert_eq!(union.len(), 2);
    }

    #[test]
    fn override_replaces_only_incoming_group() {
        let mut state = GroupToRootComponents::default();
        state.set_group("a", BTreeMap::from([(name("X"), v("1.0.0"))]));
        state.set_group("b", BTreeMap::from([(name("Y"), v("2.0.0"))]));

        let incoming = BTreeMap::from([(name("X"), VersionConstraint::new("^2.0.0").unwrap())]);
        let merged = state.root_requirements_with_override("a", &incoming);
        assert_eq!(merged.get(&name("X")).unwrap().as_str(), "^2.0.0");
        assert_eq!(merged.get(&name("Y")).unwrap().as_str(), "=2.0.0");
    }
}
