//! Phase 4 (Apply) and the cancellation checkpoints of phase 4.4.2. Phases
//! 2 (Snapshot) and 5's persistence side (commit / restore-from-snapshot)
//! are driven by the caller using `ridgeline-state`; this module only knows
//! how to move a running topology from one resolved tree to another
//! through a [`ServiceSupervisor`] — which is exactly what "restore from
//! the snapshot (reverse apply...)" needs too, just invoked with the
//! snapshot as the target.

use std::collections::BTreeSet;
use std::time::Duration;

use ridgeline_config::ResolvedServices;
use ridgeline_core::ComponentName;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::plan::Plan;
use crate::state::ServiceState;
use crate::supervisor::ServiceSupervisor;

/// A cooperative cancellation signal checked at well-defined checkpoints:
/// before the update-check vote, and between per-service steps in Apply.
#[derive(Debug, Clone)]
pub struct Cancellation(watch::Receiver<bool>);

impl Cancellation {
    #[must_use]
    pub fn new() -> (CancellationHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancellationHandle(tx), Self(rx))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Wait until cancelled, or forever if the paired handle is dropped
    /// without cancelling. Used to interrupt a reschedule sleep between
    /// phase 3 and phase 4 at the first cancellation checkpoint.
    pub async fn wait_cancelled(&self) {
        let mut rx = self.0.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

/// The caller-held half: calling [`Self::cancel`] trips every clone of the
/// paired [`Cancellation`].
#[derive(Debug, Clone)]
pub struct CancellationHandle(watch::Sender<bool>);

impl CancellationHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// The result of driving the Apply phase to completion or interruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Every target service reached a success state within the deadline.
    Success,
    /// These services entered `Broken` (or never settled before the
    /// deadline — reported the same way, since the caller's policy
    /// response is identical either way).
    Broken(BTreeSet<ComponentName>),
    /// The cancellation signal tripped before commit.
    Cancelled,
}

/// Drive the Apply phase: stop removed/updated services in reverse
/// dependency order, replace configuration, install/remove recipes, start
/// added/updated services in forward dependency order, then wait for every
/// started service to settle.
///
/// `stop_order` and `start_order` are full topological orders over the
/// *union* of current and target components (the caller already has these
/// from `ridgeline-resolver`'s dependency graph); this function filters
/// each down to the names the plan actually touches.
pub async fn apply(
    plan: &Plan,
    target: &ResolvedServices,
    stop_order: &[ComponentName],
    start_order: &[ComponentName],
    supervisor: &dyn ServiceSupervisor,
    deadline: Instant,
    cancellation: &Cancellation,
) -> ApplyOutcome {
    let to_stop = plan.to_stop();
    let to_start = plan.to_start();

    for name in stop_order.iter().filter(|n| to_stop.contains(*n)) {
        if cancellation.is_cancelled() {
            return ApplyOutcome::Cancelled;
        }
        info!(component = %name, "stopping for deployment apply");
        if let Err(error) = supervisor.stop(name).await {
            warn!(component = %name, %error, "stop failed, continuing apply");
        }
        if plan.removed.contains(name) {
            if let Err(error) = supervisor.remove(name).await {
                warn!(component = %name, %error, "remove failed");
            }
        }
    }

    if cancellation.is_cancelled() {
        return ApplyOutcome::Cancelled;
    }

    for name in &to_start {
        if let Some(component) = target.components.get(name) {
            if let Err(error) = supervisor.install(name, &component.lifecycle).await {
                warn!(component = %name, %error, "install failed before start");
            }
        }
    }

    for name in start_order.iter().filter(|n| to_start.contains(*n)) {
        if cancellation.is_cancelled() {
            return ApplyOutcome::Cancelled;
        }
        info!(component = %name, "starting for deployment apply");
        if let Err(error) = supervisor.start(name).await {
            warn!(component = %name, %error, "start request failed");
        }
    }

    let mut broken = BTreeSet::new();
    for name in &to_start {
        if cancellation.is_cancelled() {
            return ApplyOutcome::Cancelled;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        let settled = supervisor.wait_until_settled(name, remaining).await;
        if !settled.is_success() {
            warn!(component = %name, state = %settled, "service did not reach a success state");
            broken.insert(name.clone());
        }
    }

    if broken.is_empty() {
        ApplyOutcome::Success
    } else {
        ApplyOutcome::Broken(broken)
    }
}

/// Default per-service settle wait when no tighter deployment deadline
/// applies (used by tests and as a documented fallback).
#[must_use]
pub fn default_settle_timeout() -> Duration {
    Duration::from_secs(60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use ridgeline_config::MainEntry;
    use ridgeline_core::{ConfigValue, LifecycleStage};
    use semver::Version;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn name(s: &str) -> ComponentName {
        ComponentName::new(s).unwrap()
    }

    struct FakeSupervisor {
        states: Mutex<BTreeMap<ComponentName, ServiceState>>,
        break_on_start: BTreeSet<ComponentName>,
    }

    impl FakeSupervisor {
        fn new(break_on_start: &[&str]) -> Self {
            Self {
                states: Mutex::new(BTreeMap::new()),
                break_on_start: break_on_start.iter().map(|s| name(s)).collect(),
            }
        }
    }

    #[async_trait]
    impl ServiceSupervisor for FakeSupervisor {
        async fn install(&self, name: &ComponentName, _lifecycle: &[LifecycleStage]) -> Result<(), String> {
            self.states.lock().insert(name.clone(), ServiceState::Installed);
            Ok(())
        }

        async fn start(&self, name: &ComponentName) -> Result<(), String> {
            let state = if self.break_on_start.contains(name) {
                ServiceState::Broken
            } else {
                ServiceState::Running
            };
            self.states.lock().insert(name.clone(), state);
            Ok(())
        }

        async fn stop(&self, name: &ComponentName) -> Result<(), String> {
            self.states.lock().insert(name.clone(), ServiceState::Finished);
            Ok(())
        }

        async fn remove(&self, name: &ComponentName) -> Result<(), String> {
            self.states.lock().remove(name);
            Ok(())
        }

        fn current_state(&self, name: &ComponentName) -> ServiceState {
            self.states.lock().get(name).copied().unwrap_or(ServiceState::New)
        }

        async fn wait_until_settled(&self, name: &ComponentName, _deadline: Duration) -> ServiceState {
            self.current_state(name)
        }

        async fn run_bootstrap_stage(
            &self,
            _name: &ComponentName,
            _stage: &LifecycleStage,
        ) -> crate::supervisor::BootstrapOutcome {
            crate::supervisor::BootstrapOutcome::Completed
        }
    }

    fn target_with(names: &[&str]) -> ResolvedServices {
        let components = names
            .iter()
            .map(|n| {
                (
                    name(n),
                    ridgeline_config::ResolvedComponent {
                        version: Version::parse("1.0.0").unwrap(),
                        dependencies: vec![],
                        configuration: ConfigValue::object(),
                        lifecycle: vec![],
                    },
                )
            })
            .collect();
        ResolvedServices {
            components,
            main: MainEntry { dependencies: vec![] },
        }
    }

    #[tokio::test]
    async fn successful_apply_starts_every_added_service() {
        let plan = Plan {
            added: BTreeSet::from([name("App")]),
            ..Plan::default()
        };
        let target = target_with(&["App"]);
        let supervisor = FakeSupervisor::new(&[]);
        let order = vec![name("App")];
        let (_, cancellation) = Cancellation::new();

        let outcome = apply(
            &plan,
            &target,
            &order,
            &order,
            &supervisor,
            Instant::now() + Duration::from_secs(5),
            &cancellation,
        )
        .await;

        assert_eq!(outcome, ApplyOutcome::Success);
    }

    #[tokio::test]
    async fn a_service_that_breaks_on_start_is_reported() {
        let plan = Plan {
            added: BTreeSet::from([name("Bad")]),
            ..Plan::default()
        };
        let target = target_with(&["Bad"]);
        let supervisor = FakeSupervisor::new(&["Bad"]);
        let order = vec![name("Bad")];
        let (_, cancellation) = Cancellation::new();

        let outcome = apply(
            &plan,
            &target,
            &order,
            &order,
            &supervisor,
            Instant::now() + Duration::from_secs(5),
            &cancellation,
        )
        .await;

        assert_eq!(outcome, ApplyOutcome::Broken(BTreeSet::from([name("Bad")])));
    }

    #[tokio::test]
    async fn wait_cancelled_resolves_once_the_handle_cancels() {
        let (handle, cancellation) = Cancellation::new();
        let waiter = tokio::spawn(async move {
            cancellation.wait_cancelled().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_cancelled should resolve promptly after cancel")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn wait_cancelled_returns_immediately_if_already_cancelled() {
        let (handle, cancellation) = Cancellation::new();
        handle.cancel();
        tokio::time::timeout(Duration::from_millis(50), cancellation.wait_cancelled())
            .await
            .expect("already-cancelled wait should not block");
    }

    #[tokio::test]
    async fn cancellation_before_start_short_circuits_apply() {
        let plan = Plan {
            added: BTreeSet::from([name("App")]),
            ..Plan::default()
        };
        let target = target_with(&["App"]);
        let supervisor = FakeSupervisor::new(&[]);
        let order = vec![name("App")];
        let (handle, cancellation) = Cancellation::new();
        handle.cancel();

        let outcome = apply(
            &plan,
            &target,
            &order,
            &order,
            &supervisor,
            Instant::now() + Duration::from_secs(5),
            &cancellation,
        )
        .await;

        assert_eq!(outcome, ApplyOutcome::Cancelled);
    }

    #[tokio::test]
    async fn removed_services_are_stopped_and_removed() {
        let plan = Plan {
            removed: BTreeSet::from([name("Old")]),
            ..Plan::default()
        };
        let target = target_with(&[]);
        let supervisor = Arc::new(FakeSupervisor::new(&[]));
        supervisor.states.lock().insert(name("Old"), ServiceState::Running);
        let order = vec![name("Old")];
        let (_, cancellation) = Cancellation::new();

        let outcome = apply(
            &plan,
            &target,
            &order,
            &order,
            supervisor.as_ref(),
            Instant::now() + Duration::from_secs(5),
            &cancellation,
        )
        .await;

        assert_eq!(outcome, ApplyOutcome::Success);
        assert!(supervisor.states.lock().get(&name("Old")).is_none());
    }
}
