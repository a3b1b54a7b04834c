//! Path layout for the content-addressed component store:
//!
//! ```text
//! <root>/packages/
//!   recipes/<name>-<version>.yaml
//!   artifacts/<name>/<version>/...
//!   artifacts-decompressed/<name>/<version>/...
//! ```

use std::path::{Path, PathBuf};

use ridgeline_core::ComponentIdentifier;

/// Root of the `packages/` tree under a store root.
#[must_use]
pub fn packages_root(store_root: &Path) -> PathBuf {
    store_root.join("packages")
}

#[must_use]
pub fn recipes_dir(store_root: &Path) -> PathBuf {
    packages_root(store_root).join("recipes")
}

#[must_use]
pub fn artifacts_root(store_root: &Path) -> PathBuf {
    packages_root(store_root).join("artifacts")
}

#[must_use]
pub fn artifacts_decompressed_root(store_root: &Path) -> PathBuf {
    packages_root(store_root).join("artifacts-decompressed")
}

#[must_use]
pub fn recipe_path(store_root: &Path, id: &ComponentIdentifier) -> PathBuf {
    recipes_dir(store_root).join(format!("{}-{}.yaml", id.name, id.version))
}

#[must_use]
pub fn artifact_dir(store_root: &Path, id: &ComponentIdentifier) -> PathBuf {
    artifacts_root(store_root)
        .join(id.name.as_str())
        .join(id.version.to_string())
}

#[must_use]
pub fn artifact_decompressed_dir(store_root: &Path, id: &ComponentIdentifier) -> PathBuf {
    artifacts_decompressed_root(store_root)
        .join(id.name.as_str())
        .join(id.version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridgeline_core::ComponentName;
    use semver::Version;

    fn id() -> ComponentIdentifier {
        ComponentIdentifier::new(
            ComponentName::new("com.example.Foo").unwrap(),
            Version::parse("1.2.3").unwrap(),
        )
    }

    #[test]
    fn recipe_path_uses_name_dash_version() {
        let root = Path::new("/store");
        assert_eq!(
            recipe_path(root, &id()),
            PathBuf::from("/store/packages/recipes/com.example.Foo-1.2.3.yaml")
        );
    }

    #[test]
    fn artifact_dir_nests_by_name_then_version() {
        let root = Path::new("/store");
        assert_eq!(
            artifact_dir(root, &id()),
            PathBuf::from("/store/packages/artifacts/com.example.Foo/1.2.3")
        );
    }
}
