//! Persisted orchestrator state: the group-to-roots map, rollback
//! snapshots, in-progress bootstrap-deployment records, the per-deployment
//! scratch directory manager, and the transactional atomic-write primitive
//! they all share.

mod atomic;
mod bootstrap;
mod deployment_dir;
mod group_roots;
mod snapshot;

pub use atomic::write_atomically;
pub use bootstrap::{find_in_progress, InProgressDeployment};
pub use deployment_dir::{DeploymentDirectory, DeploymentDirectoryManager};
pub use group_roots::{group_roots_path, GroupToRootComponents};
pub use snapshot::RollbackSnapshot;
