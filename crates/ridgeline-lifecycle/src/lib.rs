//! The service lifecycle state machine and the merge engine that applies a
//! resolved configuration tree to the running supervisor.

mod bootstrap;
mod deferral;
mod merger;
mod plan;
mod state;
mod supervisor;

pub use bootstrap::{run_bootstrap, BootstrapRunOutcome};
pub use deferral::{DeferComponentUpdate, DeferralCoordinator, PreComponentUpdate};
pub use merger::{apply, default_settle_timeout, ApplyOutcome, Cancellation, CancellationHandle};
pub use plan::{compute_plan, Plan};
pub use state::ServiceState;
pub use supervisor::{BootstrapOutcome, ServiceSupervisor};
