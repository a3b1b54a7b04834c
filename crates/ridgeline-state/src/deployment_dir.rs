//! The deployment directory manager: a per-deployment on-disk scratchpad
//! with `snapshot/`, `bootstrap/`, and `artifacts-staging/` subfolders,
//! keyed by configuration ARN, with idempotent creation.

use std::path::{Path, PathBuf};

use ridgeline_core::{Error, Result};

/// A handle onto one deployment's scratch directory under
/// `<root>/deployments/<id>/`.
#[derive(Debug, Clone)]
pub struct DeploymentDirectory {
    root: PathBuf,
}

impl DeploymentDirectory {
    fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn snapshot_dir(&self) -> PathBuf {
        self.root.join("snapshot")
    }

    #[must_use]
    pub fn bootstrap_dir(&self) -> PathBuf {
        self.root.join("bootstrap")
    }

    #[must_use]
    pub fn artifacts_staging_dir(&self) -> PathBuf {
        self.root.join("artifacts-staging")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }
}

/// Manages the `<root>/deployments/` tree. `id` is the deployment's
/// configuration ARN; it is sanitized to a filesystem-safe form before use.
#[derive(Debug, Clone)]
pub struct DeploymentDirectoryManager {
    deployments_root: PathBuf,
}

impl DeploymentDirectoryManager {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            deployments_root: root.join("deployments"),
        }
    }

    /// Return the scratch directory for `id`, creating it (and its three
    /// subfolders) if it does not already exist. Calling this twice for the
    /// same `id` is a no-op the second time: the existing directory and its
    /// contents are left untouched (spec: "`createIfNotExists` returns an
    /// existing directory untouched").
    pub fn create_if_not_exists(&self, id: &str) -> Result<DeploymentDirectory> {
        let root = self.deployments_root.join(sanitize(id));
        for sub in ["snapshot", "bootstrap", "artifacts-staging"] {
            let dir = root.join(sub);
            std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        Ok(DeploymentDirectory::new(root))
    }

    /// Delete a completed, non-bootstrap deployment's scratch directory
    /// entirely (spec: "directories for completed, non-bootstrap
    /// deployments are deleted on commit"). Tolerates the directory already
    /// being gone.
    pub fn remove(&self, id: &str) -> Result<()> {
        let root = self.deployments_root.join(sanitize(id));
        match std::fs::remove_dir_all(&root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&root, e)),
        }
    }

    #[must_use]
    pub fn exists(&self, id: &str) -> bool {
        self.deployments_root.join(sanitize(id)).is_dir()
    }
}

/// Configuration ARNs contain characters (`:`, `/`) unsafe for a single path
/// segment on most filesystems; percent-style escape them into a flat name.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_if_not_exists_makes_all_three_subfolders() {
        let dir = tempdir().unwrap();
        let manager = DeploymentDirectoryManager::new(dir.path());
        let handle = manager.create_if_not_exists("arn:aws:greengrass:deployment:1").unwrap();
        assert!(handle.snapshot_dir().is_dir());
        assert!(handle.bootstrap_dir().is_dir());
        assert!(handle.artifacts_staging_dir().is_dir());
    }

    #[test]
    fn create_if_not_exists_is_idempotent_and_preserves_contents() {
        let dir = tempdir().unwrap();
        let manager = DeploymentDirectoryManager::new(dir.path());
        let handle = manager.create_if_not_exists("dep-1").unwrap();
        std::fs::write(handle.snapshot_dir().join("marker"), b"x").unwrap();

        let handle_again = manager.create_if_not_exists("dep-1").unwrap();
        assert!(handle_again.snapshot_dir().join("marker").is_file());
    }

    #[test]
    fn remove_deletes_the_whole_scratch_tree() {
        let dir = tempdir().unwrap();
        let manager = DeploymentDirectoryManager::new(dir.path());
        manager.create_if_not_exists("dep-1").unwrap();
        assert!(manager.exists("dep-1"));
        manager.remove("dep-1").unwrap();
        assert!(!manager.exists("dep-1"));
    }

    #[test]
    fn remove_tolerates_an_already_missing_directory() {
        let dir = tempdir().unwrap();
        let manager = DeploymentDirectoryManager::new(dir.path());
        assert!(manager.remove("never-created").is_ok());
    }
}
