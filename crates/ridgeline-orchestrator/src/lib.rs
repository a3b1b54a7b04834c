//! Ties dependency resolution, the component store, configuration
//! resolution, and the lifecycle merger into one serialized deployment
//! pipeline, owned by a single [`SupervisorContext`]. The single-writer
//! guarantee comes from the caller holding `&mut SupervisorContext`
//! across one deployment at a time — `ridgeline-daemon`'s poll loop is
//! the actual serializer, since it drives every producer's incoming
//! directory through the same `&mut` borrow, one deployment to
//! completion before the next begins.

mod context;
mod prefetch;
mod result;

pub use context::SupervisorContext;
pub use prefetch::{ensure_resolution_installed, prefetch_candidates};
pub use result::{DeploymentResult, DeploymentStatus};
