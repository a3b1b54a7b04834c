//! The component store: a durable, content-addressed local cache of
//! recipes and artifacts.
//!
//! `ComponentStore` is the only thing in the workspace that touches
//! `packages/` on disk. Everything above it (the resolver, the
//! configuration resolver, the lifecycle merger) asks this crate for a
//! recipe or artifact path and never constructs one itself.

mod layout;
mod prune;

pub use layout::{
    artifact_decompressed_dir, artifact_dir, artifacts_decompressed_root, artifacts_root,
    packages_root, recipe_path, recipes_dir,
};
pub use prune::versions_to_remove;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ridgeline_core::{ComponentIdentifier, ComponentName, ComponentRecipe, Error, Result};
use ridgeline_fetch::{with_retry, ArtifactSource, FetchCoalescer, FetchRequest, RetryConfig};
use semver::Version;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Durable, content-addressed cache of recipes and artifacts rooted at one
/// directory on disk.
pub struct ComponentStore<S: ArtifactSource> {
    root: PathBuf,
    source: Arc<S>,
    recipe_fetches: FetchCoalescer<ComponentIdentifier, Vec<u8>>,
    artifact_fetches: FetchCoalescer<(ComponentIdentifier, String), Vec<u8>>,
    retry: RetryConfig,
}

impl<S: ArtifactSource> std::fmt::Debug for ComponentStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl<S: ArtifactSource> ComponentStore<S> {
    pub fn new(root: impl Into<PathBuf>, source: Arc<S>) -> Self {
        Self {
            root: root.into(),
            source,
            recipe_fetches: FetchCoalescer::new(),
            artifact_fetches: FetchCoalescer::new(),
            retry: RetryConfig::default(),
        }
    }

    /// Override the transient-fetch retry policy (default: 3 retries,
    /// 250ms-5s exponential backoff). Digest mismatches and a recipe the
    /// source genuinely doesn't have are not retried — only the transport
    /// call itself is wrapped.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `resolveRecipePath` (pure, no I/O).
    #[must_use]
    pub fn resolve_recipe_path(&self, id: &ComponentIdentifier) -> PathBuf {
        recipe_path(&self.root, id)
    }

    /// `hasRecipeAndArtifacts`.
    #[must_use]
    pub fn has_recipe_and_artifacts(&self, id: &ComponentIdentifier) -> bool {
        self.resolve_recipe_path(id).is_file() && artifact_dir(&self.root, id).is_dir()
    }

    /// Load and parse the recipe for `id` from local disk, without
    /// fetching. Returns `RecipeNotFound` if it isn't cached.
    pub fn load_recipe(&self, id: &ComponentIdentifier) -> Result<ComponentRecipe> {
        let path = self.resolve_recipe_path(id);
        let bytes = std::fs::read(&path).map_err(|_| Error::RecipeNotFound {
            name: id.name.to_string(),
            requirement: id.version.to_string(),
        })?;
        serde_yaml::from_slice(&bytes).map_err(Error::Yaml)
    }

    /// Every version of `name` currently cached locally, recipe-only
    /// (artifacts may or may not be present, e.g. after a partial prune
    /// retry failure).
    #[must_use]
    pub fn local_versions(&self, name: &ComponentName) -> Vec<Version> {
        let dir = recipes_dir(&self.root);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let prefix = format!("{name}-");
        entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let file_name = file_name.to_str()?;
                let stem = file_name.strip_suffix(".yaml")?;
                let version_str = stem.strip_prefix(&prefix)?;
                Version::parse(version_str).ok()
            })
            .collect()
    }

    /// Ensure `id`'s recipe and artifacts are present locally, fetching
    /// through the injected [`ArtifactSource`] and verifying digests on
    /// miss. Concurrent calls for the same identity coalesce.
    pub async fn ensure_installed(&self, id: &ComponentIdentifier) -> Result<ComponentRecipe> {
        if !self.resolve_recipe_path(id).is_file() {
            self.fetch_and_install_recipe(id).await?;
        }
        let recipe = self.load_recipe(id)?;

        if !artifact_dir(&self.root, id).is_dir() {
            self.fetch_and_install_artifacts(id, &recipe).await?;
        }
        Ok(recipe)
    }

    async fn fetch_and_install_recipe(&self, id: &ComponentIdentifier) -> Result<()> {
        let source = self.source.clone();
        let request = FetchRequest::Recipe(id.clone());
        let retry = self.retry.clone();
        let bytes = self
            .recipe_fetches
            .get_or_fetch(id.clone(), || async move {
                with_retry(&retry, || async { source.fetch(&request).await.map(|f| f.data) }).await
            })
            .await
            .map_err(|message| Error::ArtifactDownloadFailed {
                name: id.name.to_string(),
                version: id.version.to_string(),
                message,
            })?;

        self.write_atomically(&recipe_path(&self.root, id), &bytes)?;
        info!(component = %id, "installed recipe");
        Ok(())
    }

    async fn fetch_and_install_artifacts(
        &self,
        id: &ComponentIdentifier,
        recipe: &ComponentRecipe,
    ) -> Result<()> {
        let platform = ridgeline_core::Platform::current();
        let filters: Vec<_> = recipe.manifests.iter().map(|m| m.platform.clone()).collect();
        let Some(idx) = ridgeline_core::platform::select_manifest(&filters, &platform) else {
            debug!(component = %id, "no manifest matches current platform, nothing to install");
            return Ok(());
        };
        let manifest = &recipe.manifests[idx];

        let staging = tempfile::tempdir().map_err(|e| Error::io(&self.root, e))?;
        for artifact in &manifest.artifacts {
            self.fetch_one_artifact(id, artifact, staging.path()).await?;
        }

        let final_dir = artifact_dir(&self.root, id);
        if let Some(parent) = final_dir.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        atomic_rename_dir(staging.path(), &final_dir)?;

        for artifact in &manifest.artifacts {
            if artifact.unarchive != ridgeline_core::UnarchivePolicy::None {
                let file_name = artifact_file_name(&artifact.uri);
                let archive_path = final_dir.join(&file_name);
                let dest = artifact_decompressed_dir(&self.root, id);
                ridgeline_archive::unarchive(&archive_path, &dest, artifact.unarchive)?;
            }
        }
        info!(component = %id, count = manifest.artifacts.len(), "installed artifacts");
        Ok(())
    }

    async fn fetch_one_artifact(
        &self,
        id: &ComponentIdentifier,
        artifact: &ridgeline_core::ArtifactDescriptor,
        staging_dir: &Path,
    ) -> Result<()> {
        let source = self.source.clone();
        let request = FetchRequest::Artifact {
            id: id.clone(),
            uri: artifact.uri.clone(),
        };
        let key = (id.clone(), artifact.uri.clone());
        let retry = self.retry.clone();
        let bytes = self
            .artifact_fetches
            .get_or_fetch(key, || async move {
                with_retry(&retry, || async { source.fetch(&request).await.map(|f| f.data) }).await
            })
            .await
            .map_err(|message| Error::ArtifactDownloadFailed {
                name: id.name.to_string(),
                version: id.version.to_string(),
                message,
            })?;

        ridgeline_fetch::verify_digest(id.name.as_str(), &id.version.to_string(), &artifact.digest, &bytes)?;

        let file_name = artifact_file_name(&artifact.uri);
        let path = staging_dir.join(&file_name);
        std::fs::write(&path, &bytes).map_err(|e| Error::io(&path, e))?;
        Ok(())
    }

    fn write_atomically(&self, dest: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let tmp = dest.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| Error::io(&tmp, e))?;
        std::fs::rename(&tmp, dest).map_err(|e| Error::io(dest, e))?;
        Ok(())
    }

    /// Delete every cached `(name, version)` not present in `keep`,
    /// tolerating individual delete failures (spec: "best-effort ... an
    /// in-use file that cannot be deleted is retried on the next
    /// deployment"). Returns the set actually removed.
    pub fn prune(&self, keep: &HashMap<ComponentName, HashSet<Version>>) -> Vec<(ComponentName, Version)> {
        let installed = self.installed_index();
        let doomed = versions_to_remove(&installed, keep);
        let mut removed = Vec::new();
        for (name, version) in doomed {
            let id = ComponentIdentifier::new(name.clone(), version.clone());
            let recipe_removed = std::fs::remove_file(self.resolve_recipe_path(&id)).is_ok();
            let artifacts_removed =
                ridgeline_archive::remove_dir_if_exists(&artifact_dir(&self.root, &id)).is_ok();
            let decompressed_removed =
                ridgeline_archive::remove_dir_if_exists(&artifact_decompressed_dir(&self.root, &id)).is_ok();
            if recipe_removed || artifacts_removed || decompressed_removed {
                info!(component = %id, "pruned stale version");
                removed.push((name, version));
            } else {
                warn!(component = %id, "prune retry: could not remove, will retry next deployment");
            }
        }
        removed
    }

    /// Build the `{name -> {installed versions}}` index by walking
    /// `recipes/` on disk. There is deliberately no persisted index file:
    /// the filesystem is the source of truth and recipe files are cheap to
    /// enumerate.
    #[must_use]
    pub fn installed_index(&self) -> HashMap<ComponentName, HashSet<Version>> {
        let mut index: HashMap<ComponentName, HashSet<Version>> = HashMap::new();
        for entry in WalkDir::new(recipes_dir(&self.root))
            .max_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            let Some(stem) = file_name.strip_suffix(".yaml") else {
                continue;
            };
            let Some((name, version)) = stem.rsplit_once('-') else {
                continue;
            };
            let (Ok(name), Ok(version)) = (ComponentName::new(name), Version::parse(version)) else {
                continue;
            };
            index.entry(name).or_default().insert(version);
        }
        index
    }
}

fn artifact_file_name(uri: &str) -> String {
    uri.rsplit('/').next().unwrap_or(uri).to_string()
}

fn atomic_rename_dir(from: &Path, to: &Path) -> Result<()> {
    // `to` must not exist for `rename` to behave atomically on all
    // platforms; remove any stale partial install left by a previous
    // crash before swapping the new one in.
    ridgeline_archive::remove_dir_if_exists(to)?;
    std::fs::rename(from, to).map_err(|e| Error::io(to, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ridgeline_core::{ArtifactDescriptor, ComponentType, UnarchivePolicy};
    use ridgeline_fetch::FetchedBytes;
    use sha2::Digest;
    use std::time::Duration;
    use tempfile::tempdir;

    struct FakeSource {
        recipes: dashmap::DashMap<ComponentIdentifier, Vec<u8>>,
        artifacts: dashmap::DashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl ArtifactSource for FakeSource {
        async fn fetch(&self, request: &FetchRequest) -> std::result::Result<FetchedBytes, String> {
            match request {
                FetchRequest::Recipe(id) => self
                    .recipes
                    .get(id)
                    .map(|b| FetchedBytes { data: b.clone() })
                    .ok_or_else(|| "no such recipe".to_string()),
                FetchRequest::Artifact { uri, .. } => self
                    .artifacts
                    .get(uri)
                    .map(|b| FetchedBytes { data: b.clone() })
                    .ok_or_else(|| "no such artifact".to_string()),
            }
        }

        async fn list_remote_versions(&self, _name: &ComponentName) -> Vec<Version> {
            Vec::new()
        }
    }

    /// Wraps [`FakeSource`], failing the first `fails_before_success` calls
    /// to `fetch` (per request, tracked by key) with a transient-looking
    /// error before delegating to the inner source.
    struct FlakySource {
        inner: FakeSource,
        remaining_failures: dashmap::DashMap<String, u32>,
        fails_before_success: u32,
    }

    impl FlakySource {
        fn request_key(request: &FetchRequest) -> String {
            match request {
                FetchRequest::Recipe(id) => format!("recipe:{id}"),
                FetchRequest::Artifact { uri, .. } => format!("artifact:{uri}"),
            }
        }
    }

    #[async_trait]
    impl ArtifactSource for FlakySource {
        async fn fetch(&self, request: &FetchRequest) -> std::result::Result<FetchedBytes, String> {
            let key = Self::request_key(request);
            let mut remaining = self
                .remaining_failures
                .entry(key)
                .or_insert(self.fails_before_success);
            if *remaining > 0 {
                *remaining -= 1;
                return Err("connection reset".to_string());
            }
            drop(remaining);
            self.inner.fetch(request).await
        }

        async fn list_remote_versions(&self, name: &ComponentName) -> Vec<Version> {
            self.inner.list_remote_versions(name).await
        }
    }

    fn recipe_yaml(name: &str, version: &str, digest: &str) -> Vec<u8> {
        let recipe = ComponentRecipe {
            component_name: ComponentName::new(name).unwrap(),
            component_version: Version::parse(version).unwrap(),
            component_type: ComponentType::Generic,
            default_configuration: ridgeline_core::ConfigValue::object(),
            component_dependencies: Default::default(),
            manifests: vec![ridgeline_core::Manifest {
                platform: Default::default(),
                artifacts: vec![ArtifactDescriptor {
                    uri: "https://example.com/bundle.bin".into(),
                    digest: digest.to_string(),
                    unarchive: UnarchivePolicy::None,
                }],
                lifecycle: vec![],
            }],
        };
        serde_yaml::to_string(&recipe).unwrap().into_bytes()
    }

    #[tokio::test]
    async fn ensure_installed_fetches_recipe_and_artifact() {
        let dir = tempdir().unwrap();
        let id = ComponentIdentifier::new(
            ComponentName::new("com.example.Foo").unwrap(),
            Version::parse("1.0.0").unwrap(),
        );
        let payload = b"artifact-bytes".to_vec();
        let digest = format!("sha256:{}", hex::encode(sha2::Sha256::digest(&payload)));

        let source = Arc::new(FakeSource {
            recipes: dashmap::DashMap::new(),
            artifacts: dashmap::DashMap::new(),
        });
        source
            .recipes
            .insert(id.clone(), recipe_yaml("com.example.Foo", "1.0.0", &digest));
        source
            .artifacts
            .insert("https://example.com/bundle.bin".to_string(), payload.clone());

        let store = ComponentStore::new(dir.path(), source);
        let recipe = store.ensure_installed(&id).await.unwrap();
        assert_eq!(recipe.component_name.as_str(), "com.example.Foo");
        assert!(store.has_recipe_and_artifacts(&id));

        let installed = std::fs::read(artifact_dir(dir.path(), &id).join("bundle.bin")).unwrap();
        assert_eq!(installed, payload);
    }

    #[tokio::test]
    async fn ensure_installed_survives_transient_fetch_failures() {
        let dir = tempdir().unwrap();
        let id = ComponentIdentifier::new(
            ComponentName::new("com.example.Flaky").unwrap(),
            Version::parse("1.0.0").unwrap(),
        );
        let payload = b"artifact-bytes".to_vec();
        let digest = format!("sha256:{}", hex::encode(sha2::Sha256::digest(&payload)));

        let inner = FakeSource {
            recipes: dashmap::DashMap::new(),
            artifacts: dashmap::DashMap::new(),
        };
        inner
            .recipes
            .insert(id.clone(), recipe_yaml("com.example.Flaky", "1.0.0", &digest));
        inner
            .artifacts
            .insert("https://example.com/bundle.bin".to_string(), payload.clone());
        let source = Arc::new(FlakySource {
            inner,
            remaining_failures: dashmap::DashMap::new(),
            fails_before_success: 2,
        });

        let store = ComponentStore::new(dir.path(), source).with_retry_config(RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        });
        let recipe = store.ensure_installed(&id).await.unwrap();
        assert_eq!(recipe.component_name.as_str(), "com.example.Flaky");
        assert!(store.has_recipe_and_artifacts(&id));
    }

    #[tokio::test]
    async fn ensure_installed_gives_up_after_exhausting_retries() {
        let dir = tempdir().unwrap();
        let id = ComponentIdentifier::new(
            ComponentName::new("com.example.TooFlaky").unwrap(),
            Version::parse("1.0.0").unwrap(),
        );
        let inner = FakeSource {
            recipes: dashmap::DashMap::new(),
            artifacts: dashmap::DashMap::new(),
        };
        inner
            .recipes
            .insert(id.clone(), recipe_yaml("com.example.TooFlaky", "1.0.0", "sha256:00"));
        let source = Arc::new(FlakySource {
            inner,
            remaining_failures: dashmap::DashMap::new(),
            fails_before_success: 10,
        });

        let store = ComponentStore::new(dir.path(), source).with_retry_config(RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        });
        let err = store.ensure_installed(&id).await.unwrap_err();
        assert!(matches!(err, Error::ArtifactDownloadFailed { .. }));
    }

    #[tokio::test]
    async fn digest_mismatch_is_rejected_and_nothing_installed() {
        let dir = tempdir().unwrap();
        let id = ComponentIdentifier::new(
            ComponentName::new("com.example.Bad").unwrap(),
            Version::parse("1.0.0").unwrap(),
        );
        let source = Arc::new(FakeSource {
            recipes: dashmap::DashMap::new(),
            artifacts: dashmap::DashMap::new(),
        });
        source.recipes.insert(
            id.clone(),
            recipe_yaml("com.example.Bad", "1.0.0", "sha256:deadbeef"),
        );
        source
            .artifacts
            .insert("https://example.com/bundle.bin".to_string(), b"wrong".to_vec());

        let store = ComponentStore::new(dir.path(), source);
        let err = store.ensure_installed(&id).await.unwrap_err();
        assert!(matches!(err, Error::DigestMismatch { .. }));
        assert!(!artifact_dir(dir.path(), &id).is_dir());
    }

    #[test]
    fn prune_removes_versions_outside_keep_set() {
        let dir = tempdir().unwrap();
        let source = Arc::new(FakeSource {
            recipes: dashmap::DashMap::new(),
            artifacts: dashmap::DashMap::new(),
        });
        let store = ComponentStore::new(dir.path(), source);

        for version in ["1.0.0", "2.0.0", "3.0.0"] {
            let id = ComponentIdentifier::new(
                ComponentName::new("App").unwrap(),
                Version::parse(version).unwrap(),
            );
            store
                .write_atomically(&recipe_path(dir.path(), &id), &recipe_yaml("App", version, "sha256:00"))
                .unwrap();
        }

        let mut keep = HashMap::new();
        keep.insert(
            ComponentName::new("App").unwrap(),
            HashSet::from([Version::parse("3.0.0").unwrap()]),
        );
        let removed = store.prune(&keep);
        assert_eq!(removed.len(), 2);
        assert!(store
            .resolve_recipe_path(&ComponentIdentifier::new(
                ComponentName::new("App").unwrap(),
                Version::parse("3.0.0").unwrap()
            ))
            .is_file());
        assert!(!store
            .resolve_recipe_path(&ComponentIdentifier::new(
                ComponentName::new("App").unwrap(),
                Version::parse("1.0.0").unwrap()
            ))
            .is_file());
    }
}
