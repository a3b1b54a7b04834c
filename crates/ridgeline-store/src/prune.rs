//! Preemptive cleanup of stale component versions.
//!
//! For each root name, at most the union of `{running version, target
//! version}` survives; every other locally cached version of that name is
//! eligible for deletion. Pruning only ever touches names that are roots or
//! reachable dependencies of the current resolution; it never invents
//! names the store has never heard of.

use std::collections::{HashMap, HashSet};

use ridgeline_core::ComponentName;
use semver::Version;

/// Decide which `(name, version)` pairs installed in the store are no
/// longer reachable from `keep`, given everything the store currently has
/// on disk in `installed`.
///
/// `keep` is the union of every name's running version (if any) and its
/// resolved target version (if any) — i.e. the set computed by the caller
/// by walking the dependency closure of the new and previously-running
/// root sets.
#[must_use]
pub fn versions_to_remove(
    installed: &HashMap<ComponentName, HashSet<Version>>,
    keep: &HashMap<ComponentName, HashSet<Version>>,
) -> Vec<(ComponentName, Version)> {
    let mut doomed = Vec::new();
    for (name, versions) in installed {
        let keep_versions = keep.get(name);
        for version in versions {
            let survives = keep_versions.is_some_and(|kept| kept.contains(version));
            if !survives {
                doomed.push((name.clone(), version.clone()));
            }
        }
    }
    doomed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ComponentName {
        ComponentName::new(s).unwrap()
    }
    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn keeps_running_and_target_drops_everything_else() {
        let mut installed = HashMap::new();
        installed.insert(
            name("App"),
            HashSet::from([v("1.0.0"), v("2.0.0"), v("3.0.0")]),
        );
        let mut keep = HashMap::new();
        keep.insert(name("App"), HashSet::from([v("3.0.0")]));

        let doomed = versions_to_remove(&installed, &keep);
        let doomed_versions: HashSet<_> = doomed.into_iter().map(|(_, v)| v).collect();
        assert_eq!(doomed_versions, HashSet::from([v("1.0.0"), v("2.0.0")]));
    }

    #[test]
    fn name_absent_from_keep_loses_every_version() {
        let mut installed = HashMap::new();
        installed.insert(name("Orphan"), HashSet::from([v("1.0.0")]));
        let keep = HashMap::new();

        let doomed = versions_to_remove(&installed, &keep);
        assert_eq!(doomed, vec![(name("Orphan"), v("1.0.0"))]);
    }

    #[test]
    fn downgrade_keeps_both_old_and_new_when_both_requested() {
        let mut installed = HashMap::new();
        installed.insert(name("App"), HashSet::from([v("1.0.0"), v("2.0.0")]));
        let mut keep = HashMap::new();
        keep.insert(name("App"), HashSet::from([v("1.0.0"), v("2.0.0")]));

        assert!(versions_to_remove(&installed, &keep).is_empty());
    }
}
