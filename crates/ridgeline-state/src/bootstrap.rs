//! Persisted in-progress deployment state, keyed by deployment ID, used
//! to resume a bootstrap-requiring deployment across a supervisor
//! restart. Only bootstrap-requiring deployments
//! ever write one of these; everything else finishes inside a single
//! `DEFAULT`-stage pass and never touches this module.

use std::collections::BTreeMap;
use std::path::Path;

use ridgeline_config::ResolvedServices;
use ridgeline_core::{ComponentName, DeploymentDocument, DeploymentStage, Error, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::atomic::write_atomically;

const STATE_FILE_NAME: &str = "in-progress.json";

/// Everything needed to resume a bootstrap-requiring deployment after the
/// supervisor restart it requested: the stage it was last known to be in,
/// the original request (for its failure-handling policy and root
/// updates), and the target topology it was converging toward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InProgressDeployment {
    pub deployment_id: String,
    pub stage: DeploymentStage,
    pub document: DeploymentDocument,
    pub target: ResolvedServices,
    pub assignments: BTreeMap<ComponentName, Version>,
}

impl InProgressDeployment {
    /// Persist into `bootstrap_dir` (the deployment directory manager's
    /// `bootstrap/` subfolder), atomically.
    pub fn save(&self, bootstrap_dir: &Path) -> Result<()> {
        let bytes = sonic_rs::to_string(self)
            .map_err(|e| Error::ConfigStore(e.to_string()))?
            .into_bytes();
        write_atomically(&bootstrap_dir.join(STATE_FILE_NAME), &bytes)
    }

    /// Load a previously persisted in-progress record from `bootstrap_dir`.
    /// `Ok(None)` means no bootstrap-requiring deployment ever started
    /// there (the common case).
    pub fn load(bootstrap_dir: &Path) -> Result<Option<Self>> {
        let path = bootstrap_dir.join(STATE_FILE_NAME);
        match std::fs::read(&path) {
            Ok(bytes) => sonic_rs::from_slice(&bytes)
                .map(Some)
                .map_err(|e| Error::ConfigStore(format!("corrupt in-progress deployment state at {}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&path, e)),
        }
    }
}

/// Scan `<root>/deployments/*/bootstrap/` for a persisted in-progress
/// record. The deployment lane's strict single-writer serialization means
/// at most one should ever exist; if more than one somehow does (e.g.
/// leftover from a bug), the first found in directory-listing order is
/// resumed and the rest are left for the operator to inspect — resumption
/// never silently discards state.
#[must_use]
pub fn find_in_progress(deployments_root: &Path) -> Option<InProgressDeployment> {
    let entries = std::fs::read_dir(deployments_root).ok()?;
    let mut candidates: Vec<_> = entries.filter_map(std::result::Result::ok).map(|e| e.path()).collect();
    candidates.sort();
    for deployment_dir in candidates {
        let bootstrap_dir = deployment_dir.join("bootstrap");
        if let Ok(Some(record)) = InProgressDeployment::load(&bootstrap_dir) {
            return Some(record);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridgeline_config::MainEntry;
    use ridgeline_core::{ComponentUpdatePolicy, FailureHandlingPolicy};
    use std::collections::BTreeMap as Map;
    use tempfile::tempdir;

    fn sample_document() -> DeploymentDocument {
        DeploymentDocument {
            group_name: "fleet-a".to_string(),
            timestamp: 0,
            root_components: Map::new(),
            configuration_updates: Map::new(),
            failure_handling_policy: FailureHandlingPolicy::Rollback,
            component_update_policy: ComponentUpdatePolicy::default(),
        }
    }

    fn sample() -> InProgressDeployment {
        InProgressDeployment {
            deployment_id: "dep-1".to_string(),
            stage: DeploymentStage::Bootstrap,
            document: sample_document(),
            target: ResolvedServices {
                components: Map::new(),
                main: MainEntry { dependencies: vec![] },
            },
            assignments: Map::new(),
        }
    }

    #[test]
    fn load_with_no_prior_save_returns_none() {
        let dir = tempdir().unwrap();
        assert!(InProgressDeployment::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let record = sample();
        record.save(dir.path()).unwrap();
        let loaded = InProgressDeployment::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn advancing_the_stage_and_resaving_overwrites_in_place() {
        let dir = tempdir().unwrap();
        let mut record = sample();
        record.save(dir.path()).unwrap();

        record.stage = DeploymentStage::KernelActivation;
        record.save(dir.path()).unwrap();

        let loaded = InProgressDeployment::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.stage, DeploymentStage::KernelActivation);
    }

    #[test]
    fn find_in_progress_locates_the_record_under_the_deployments_root() {
        let root = tempdir().unwrap();
        let deployment_dir = root.path().join("dep-1");
        let bootstrap_dir = deployment_dir.join("bootstrap");
        std::fs::create_dir_all(&bootstrap_dir).unwrap();
        sample().save(&bootstrap_dir).unwrap();

        let found = find_in_progress(root.path()).unwrap();
        assert_eq!(found.deployment_id, "dep-1");
    }

    #[test]
    fn find_in_progress_with_no_bootstrap_deployments_returns_none() {
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("dep-1")).unwrap();
        assert!(find_in_progress(root.path()).is_none());
    }
}
