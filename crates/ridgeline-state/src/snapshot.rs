//! Rollback snapshots: persisting the current configuration, the
//! group-to-roots map, and a manifest of running versions, under a
//! deployment-scoped directory.

use std::collections::BTreeMap;
use std::path::Path;

use ridgeline_core::{ComponentName, Error, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::atomic::write_atomically;
use crate::group_roots::GroupToRootComponents;

/// Everything needed to restore the running topology if a deployment fails
/// past the point of no return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollbackSnapshot {
    /// Per-component running configuration, as it stood immediately before
    /// this deployment began applying.
    pub configurations: BTreeMap<ComponentName, ridgeline_core::ConfigValue>,
    /// The full group-to-roots map, as it stood before this deployment.
    pub group_to_root_components: GroupToRootComponents,
    /// The exact version running for every currently-installed component.
    pub running_versions: BTreeMap<ComponentName, Version>,
}

const SNAPSHOT_FILE_NAME: &str = "rollback-snapshot.json";

impl RollbackSnapshot {
    /// Persist this snapshot into `snapshot_dir` (the deployment directory
    /// manager's `snapshot/` subfolder), atomically.
    pub fn save(&self, snapshot_dir: &Path) -> Result<()> {
        let bytes = sonic_rs::to_string(self)
            .map_err(|e| Error::ConfigStore(e.to_string()))?
            .into_bytes();
        write_atomically(&snapshot_dir.join(SNAPSHOT_FILE_NAME), &bytes)
    }

    /// Load a previously persisted snapshot from `snapshot_dir`. Returns
    /// `Ok(None)` if no snapshot was ever written there (a deployment that
    /// never reached the Snapshot phase, or one already committed and
    /// cleaned up).
    pub fn load(snapshot_dir: &Path) -> Result<Option<Self>> {
        let path = snapshot_dir.join(SNAPSHOT_FILE_NAME);
        match std::fs::read(&path) {
            Ok(bytes) => sonic_rs::from_slice(&bytes)
                .map(Some)
                .map_err(|e| Error::ConfigStore(format!("corrupt rollback snapshot at {}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn name(s: &str) -> ComponentName {
        ComponentName::new(s).unwrap()
    }

    fn sample() -> RollbackSnapshot {
        let mut group_to_root_components = GroupToRootComponents::default();
        group_to_root_components.set_group(
            "fleet-a",
            BTreeMap::from([(name("App"), Version::parse("1.0.0").unwrap())]),
        );
        RollbackSnapshot {
            configurations: BTreeMap::from([(name("App"), ridgeline_core::ConfigValue::object())]),
            group_to_root_components,
            running_versions: BTreeMap::from([(name("App"), Version::parse("1.0.0").unwrap())]),
        }
    }

    #[test]
    fn load_with_no_prior_save_returns_none() {
        let dir = tempdir().unwrap();
        assert!(RollbackSnapshot::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let snapshot = sample();
        snapshot.save(dir.path()).unwrap();
        let loaded = RollbackSnapshot::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn corrupt_snapshot_file_is_reported_as_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE_NAME), b"{not json").unwrap();
        assert!(RollbackSnapshot::load(dir.path()).is_err());
    }
}
