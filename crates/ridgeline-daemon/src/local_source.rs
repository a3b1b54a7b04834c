//! A filesystem-backed [`ArtifactSource`] standing in for the cloud
//! download transport, which is treated as an external collaborator.
//! Recipes and artifacts are read from two directories the operator drops
//! files into — the same shape `UpdateRecipesAndArtifacts` preloads from —
//! rather than over a network.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ridgeline_core::ComponentName;
use ridgeline_fetch::{ArtifactSource, FetchRequest, FetchedBytes};
use semver::Version;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct LocalFilesystemSource {
    recipe_dir: PathBuf,
    artifact_dir: PathBuf,
}

impl LocalFilesystemSource {
    #[must_use]
    pub fn new(recipe_dir: impl Into<PathBuf>, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            recipe_dir: recipe_dir.into(),
            artifact_dir: artifact_dir.into(),
        }
    }
}

#[async_trait]
impl ArtifactSource for LocalFilesystemSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedBytes, String> {
        match request {
            FetchRequest::Recipe(id) => {
                let path = self.recipe_dir.join(format!("{}-{}.yaml", id.name, id.version));
                std::fs::read(&path)
                    .map(|data| FetchedBytes { data })
                    .map_err(|e| format!("reading recipe from {}: {e}", path.display()))
            }
            FetchRequest::Artifact { id, uri } => {
                let file_name = uri.rsplit('/').next().unwrap_or(uri);
                let path = self
                    .artifact_dir
                    .join(id.name.as_str())
                    .join(id.version.to_string())
                    .join(file_name);
                std::fs::read(&path)
                    .map(|data| FetchedBytes { data })
                    .map_err(|e| format!("reading artifact from {}: {e}", path.display()))
            }
        }
    }

    async fn list_remote_versions(&self, name: &ComponentName) -> Vec<Version> {
        let Ok(entries) = std::fs::read_dir(&self.recipe_dir) else {
            return Vec::new();
        };
        let prefix = format!("{name}-");
        entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let file_name = file_name.to_str()?;
                let stem = file_name.strip_suffix(".yaml")?;
                let version = stem.strip_prefix(&prefix)?;
                Version::parse(version).ok()
            })
            .collect()
    }
}

/// Enumerate every `(name, version)` recipe found directly under
/// `recipe_dir`, for `UpdateRecipesAndArtifacts` to drive `ensure_installed`
/// over.
#[must_use]
pub fn discover_recipes(recipe_dir: &Path) -> Vec<(ComponentName, Version)> {
    let mut found = Vec::new();
    for entry in WalkDir::new(recipe_dir).max_depth(1).into_iter().filter_map(std::result::Result::ok) {
        let Some(file_name) = entry.file_name().to_str() else { continue };
        let Some(stem) = file_name.strip_suffix(".yaml") else { continue };
        let Some((name, version)) = stem.rsplit_once('-') else { continue };
        match (ComponentName::new(name), Version::parse(version)) {
            (Ok(name), Ok(version)) => found.push((name, version)),
            _ => warn!(file = file_name, "skipping recipe file with an unparsable name"),
        }
    }
    found
}
