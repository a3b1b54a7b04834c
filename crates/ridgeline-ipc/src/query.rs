//! Component query/control requests: `GetComponentDetails`,
//! `ListComponents`, `RestartComponent`, `StopComponent`,
//! `UpdateRecipesAndArtifacts`.

use std::path::PathBuf;

use ridgeline_core::ComponentName;
use ridgeline_lifecycle::ServiceState;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::{CommandOutcome, IdempotencyKey};

/// `GetComponentDetails(name) -> version, state, configuration`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetComponentDetails {
    pub name: ComponentName,
}

impl IdempotencyKey for GetComponentDetails {
    fn idempotency_key(&self) -> &str {
        self.name.as_str()
    }
}

/// The reply to [`GetComponentDetails`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDetails {
    pub name: ComponentName,
    pub version: Version,
    pub state: ServiceState,
    pub configuration: ridgeline_core::ConfigValue,
}

/// `ListComponents() -> all non-main components`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListComponents;

/// `RestartComponent(name) -> SUCCEEDED | FAILED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartComponent {
    pub name: ComponentName,
}

impl IdempotencyKey for RestartComponent {
    fn idempotency_key(&self) -> &str {
        self.name.as_str()
    }
}

/// `StopComponent(name) -> SUCCEEDED | FAILED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopComponent {
    pub name: ComponentName,
}

impl IdempotencyKey for StopComponent {
    fn idempotency_key(&self) -> &str {
        self.name.as_str()
    }
}

/// Reply shared by [`RestartComponent`] and [`StopComponent`].
pub type ComponentCommandReply = CommandOutcome;

/// `UpdateRecipesAndArtifacts(recipeDir, artifactDir) -> preloads the
/// store`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecipesAndArtifacts {
    pub recipe_dir: PathBuf,
    pub artifact_dir: PathBuf,
}

impl IdempotencyKey for UpdateRecipesAndArtifacts {
    fn idempotency_key(&self) -> &str {
        // Preloading the same directory pair twice is a no-op beyond the
        // second pass re-verifying digests already on disk, so the
        // directory pair itself is a stable enough key.
        self.recipe_dir.to_str().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_scoped_requests_key_on_the_component_name() {
        let name = ComponentName::new("App").unwrap();
        let req = RestartComponent { name: name.clone() };
        assert_eq!(req.idempotency_key(), "App");
        let req = StopComponent { name };
        assert_eq!(req.idempotency_key(), "App");
    }
}
