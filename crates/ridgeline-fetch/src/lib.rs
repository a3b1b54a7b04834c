//! Artifact fetch coalescing and digest verification.
//!
//! The cloud download transport, credential issuance and region/endpoint
//! plumbing live outside this crate and are injected by the caller as an
//! implementation of [`ArtifactSource`]. This crate owns two things the
//! transport should not have to: at-most-one-fetch-in-flight coalescing
//! per component identity, and bounded retry with backoff around
//! whatever the transport returns.

mod coalesce;
mod digest;
mod retry;

pub use coalesce::FetchCoalescer;
pub use digest::{verify_digest, Digest};
pub use retry::{with_retry, RetryConfig};

use std::fmt;

use async_trait::async_trait;
use ridgeline_core::ComponentIdentifier;

/// Bytes fetched for one artifact or recipe, plus the digest the caller
/// should verify against the recipe's declared expectation.
#[derive(Clone)]
pub struct FetchedBytes {
    pub data: Vec<u8>,
}

impl fmt::Debug for FetchedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedBytes")
            .field("len", &self.data.len())
            .finish()
    }
}

/// What `ridgeline-store` asks an injected transport to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchRequest {
    /// The recipe YAML/JSON body for a component-version.
    Recipe(ComponentIdentifier),
    /// One declared artifact file, addressed by its URI as it appears in
    /// the recipe manifest.
    Artifact {
        id: ComponentIdentifier,
        uri: String,
    },
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipe(id) => write!(f, "recipe({id})"),
            Self::Artifact { id, uri } => write!(f, "artifact({id}, {uri})"),
        }
    }
}

/// The collaborator injected by the caller (cloud transport, or a
/// filesystem-backed fixture in tests). `ridgeline-store` talks only to
/// this trait; it never knows about HTTP, credentials, or regions.
#[async_trait]
pub trait ArtifactSource: Send + Sync + 'static {
    /// Fetch the bytes for `request`, or an error message suitable for
    /// wrapping in [`ridgeline_core::Error::ArtifactDownloadFailed`].
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedBytes, String>;

    /// Enumerate versions of `name` the transport knows about remotely,
    /// used by the dependency resolver when no local candidate satisfies a
    /// requirement.
    async fn list_remote_versions(&self, name: &ridgeline_core::ComponentName) -> Vec<semver::Version>;
}
