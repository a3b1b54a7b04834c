//! A minimal [`ServiceSupervisor`] for the standalone daemon binary.
//!
//! Process launching mechanics — shell invocation, platform differences —
//! are treated as an external collaborator. `LoggingSupervisor` is the
//! seam's concrete default: it logs each
//! lifecycle stage it "would" run and transitions state synchronously, so
//! the daemon is runnable end to end without committing the core to any
//! one process-launch strategy. A real deployment would swap this for an
//! implementation backed by an actual process supervisor.

use async_trait::async_trait;
use dashmap::DashMap;
use ridgeline_core::{ComponentName, LifecycleStage};
use ridgeline_lifecycle::ServiceSupervisor;
use tracing::info;

#[derive(Debug, Default)]
pub struct LoggingSupervisor {
    state: DashMap<ComponentName, ridgeline_lifecycle::ServiceState>,
}

impl LoggingSupervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceSupervisor for LoggingSupervisor {
    async fn install(&self, name: &ComponentName, lifecycle: &[LifecycleStage]) -> Result<(), String> {
        for stage in lifecycle {
            if stage.name == "install" {
                info!(component = %name, script = %stage.script, "running install stage");
            }
        }
        self.state.insert(name.clone(), ridgeline_lifecycle::ServiceState::Installed);
        Ok(())
    }

    async fn start(&self, name: &ComponentName) -> Result<(), String> {
        info!(component = %name, "starting service");
        self.state.insert(name.clone(), ridgeline_lifecycle::ServiceState::Starting);
        self.state.insert(name.clone(), ridgeline_lifecycle::ServiceState::Running);
        Ok(())
    }

    async fn stop(&self, name: &ComponentName) -> Result<(), String> {
        info!(component = %name, "stopping service");
        self.state.insert(name.clone(), ridgeline_lifecycle::ServiceState::Stopping);
        self.state.insert(name.clone(), ridgeline_lifecycle::ServiceState::Finished);
        Ok(())
    }

    async fn remove(&self, name: &ComponentName) -> Result<(), String> {
        info!(component = %name, "removing service");
        self.state.remove(name);
        Ok(())
    }

    fn current_state(&self, name: &ComponentName) -> ridgeline_lifecycle::ServiceState {
        self.state
            .get(name)
            .map_or(ridgeline_lifecycle::ServiceState::New, |entry| *entry)
    }

    async fn wait_until_settled(
        &self,
        name: &ComponentName,
        _deadline: std::time::Duration,
    ) -> ridgeline_lifecycle::ServiceState {
        self.current_state(name)
    }

    async fn run_bootstrap_stage(
        &self,
        name: &ComponentName,
        stage: &LifecycleStage,
    ) -> ridgeline_lifecycle::BootstrapOutcome {
        info!(component = %name, script = %stage.script, "running bootstrap stage");
        ridgeline_lifecycle::BootstrapOutcome::Completed
    }
}
