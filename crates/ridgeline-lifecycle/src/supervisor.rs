//! The "running supervisor" collaborator the lifecycle merger drives.
//! Process launching, shell invocation, and platform differences live
//! outside this crate; this trait is the seam a real supervisor, or a
//! test double, implements.

use async_trait::async_trait;
use ridgeline_core::{ComponentName, LifecycleStage};

use crate::state::ServiceState;

/// What running a `bootstrap` lifecycle stage left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The stage ran to completion in place; no restart is needed.
    Completed,
    /// The stage asked the supervisor to restart before the update takes
    /// full effect (e.g. a NUCLEUS self-update). The merger persists
    /// `KERNEL_ACTIVATION` and returns; resumption happens on the next
    /// process start.
    RestartRequested,
}

/// Installs and drives one service through its lifecycle stages. A real
/// implementation would run lifecycle scripts via a process launcher and
/// report state transitions as they complete; this crate only consumes the
/// interface.
#[async_trait]
pub trait ServiceSupervisor: Send + Sync {
    /// Write the service's resolved configuration and lifecycle into the
    /// running supervisor's tree without starting it; configuration is
    /// always replaced before the service is started or restarted.
    async fn install(&self, name: &ComponentName, lifecycle: &[ridgeline_core::LifecycleStage]) -> Result<(), String>;

    /// Begin the service's `startup`/`run` stages. Returns once the start
    /// request has been issued; reaching `Running` is observed separately
    /// via [`Self::current_state`] or [`Self::wait_until_settled`].
    async fn start(&self, name: &ComponentName) -> Result<(), String>;

    /// Begin the service's `shutdown` stage and wait for it to reach
    /// `Finished`.
    async fn stop(&self, name: &ComponentName) -> Result<(), String>;

    /// Remove a service no longer present in the target topology entirely
    /// (after it has been stopped).
    async fn remove(&self, name: &ComponentName) -> Result<(), String>;

    fn current_state(&self, name: &ComponentName) -> ServiceState;

    /// Block until `name` reaches a settled state (success or `Broken`) or
    /// `deadline` elapses, whichever comes first.
    async fn wait_until_settled(&self, name: &ComponentName, deadline: std::time::Duration) -> ServiceState;

    /// Run a component's `bootstrap` lifecycle stage. Called
    /// once per bootstrap-requiring component before the rest of Apply
    /// proceeds; a single `RestartRequested` from any of them aborts the
    /// current pass into `KERNEL_ACTIVATION`.
    async fn run_bootstrap_stage(&self, name: &ComponentName, stage: &LifecycleStage) -> BootstrapOutcome;
}
