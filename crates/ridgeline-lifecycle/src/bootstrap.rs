//! Bootstrap stage execution: for components whose update plan flagged
//! them bootstrap-requiring, run the `bootstrap` lifecycle stage and
//! learn whether any of them asked for a supervisor restart.

use std::collections::BTreeSet;

use ridgeline_config::ResolvedServices;
use ridgeline_core::ComponentName;
use tracing::info;

use crate::supervisor::{BootstrapOutcome, ServiceSupervisor};

/// Whether any bootstrap-requiring component in the batch asked for a
/// supervisor restart. One `RestartRequested` aborts the rest of Apply
/// into `KERNEL_ACTIVATION`, so this is a simple OR across the batch
/// rather than a per-component result the caller needs to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootstrapRunOutcome {
    pub restart_requested: bool,
}

/// Run the `bootstrap` stage for every name in `bootstrap_requiring`
/// (looked up in `target`, which already carries the fully interpolated
/// lifecycle for the version about to become current).
pub async fn run_bootstrap(
    bootstrap_requiring: &BTreeSet<ComponentName>,
    target: &ResolvedServices,
    supervisor: &dyn ServiceSupervisor,
) -> BootstrapRunOutcome {
    let mut outcome = BootstrapRunOutcome::default();
    for name in bootstrap_requiring {
        let Some(component) = target.components.get(name) else {
            continue;
        };
        let Some(stage) = component.lifecycle.iter().find(|s| s.name == "bootstrap") else {
            continue;
        };
        info!(component = %name, "running bootstrap stage");
        match supervisor.run_bootstrap_stage(name, stage).await {
            BootstrapOutcome::Completed => {}
            BootstrapOutcome::RestartRequested => {
                info!(component = %name, "bootstrap stage requested a supervisor restart");
                outcome.restart_requested = true;
            }
        }
    }
    outcome
}
