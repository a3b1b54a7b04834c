//! Platform manifest selection.
//!
//! A recipe's `Manifests` list is a sequence of per-platform artifact
//! bundles, each carrying an optional platform filter (`os`, `architecture`,
//! or `all`). At resolution time we pick the first manifest whose filter
//! matches the running device, preferring a manifest that names both `os`
//! and `architecture` over one that names only `os`, over the unconditional
//! `all` fallback.

use serde::{Deserialize, Serialize};

/// The platform the orchestrator is currently running on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
}

impl Platform {
    #[must_use]
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
        }
    }
}

/// A manifest's platform filter, as authored in a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlatformFilter {
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
}

impl PlatformFilter {
    /// `true` if this filter has no constraints at all (matches every
    /// platform).
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.os.is_none() && self.architecture.is_none()
    }

    fn matches(&self, platform: &Platform) -> bool {
        let os_ok = self
            .os
            .as_deref()
            .is_none_or(|os| os.eq_ignore_ascii_case(&platform.os) || os.eq_ignore_ascii_case("all"));
        let arch_ok = self.architecture.as_deref().is_none_or(|arch| {
            arch.eq_ignore_ascii_case(&platform.architecture) || arch.eq_ignore_ascii_case("all")
        });
        os_ok && arch_ok
    }

    /// Specificity score used to rank matching manifests: both dimensions
    /// pinned beats one dimension beats none.
    fn specificity(&self) -> u8 {
        u8::from(self.os.is_some()) + u8::from(self.architecture.is_some())
    }
}

/// Pick the most specific manifest (indexed into `filters`) matching
/// `platform`, or `None` if no manifest matches.
///
/// Ties in specificity resolve to the earliest-declared manifest, matching
/// the order components are expected to list fallbacks in a recipe.
#[must_use]
pub fn select_manifest<'a>(filters: &'a [PlatformFilter], platform: &Platform) -> Option<usize> {
    filters
        .iter()
        .enumerate()
        .filter(|(_, f)| f.matches(platform))
        .max_by_key(|(idx, f)| (f.specificity(), std::cmp::Reverse(*idx)))
        .map(|(idx, _)| idx)
}
