//! The service lifecycle state machine: `NEW → INSTALLED →
//! STARTING → RUNNING → STOPPING → FINISHED`, with sink `BROKEN` reachable
//! from any non-terminal state and transient `ERRORED`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A service's position in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    New,
    Installed,
    Starting,
    Running,
    Stopping,
    Finished,
    /// A transient, recoverable failure — the launcher may retry from here.
    Errored,
    /// The sink state: unrecoverable within this deployment attempt.
    Broken,
}

impl ServiceState {
    /// Only `Running` and `Finished` count as success for deployment
    /// evaluation.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Running | Self::Finished)
    }

    #[must_use]
    pub fn is_broken(self) -> bool {
        matches!(self, Self::Broken)
    }

    /// A service has reached a point where the merger stops waiting on it:
    /// either it succeeded or it is broken.
    #[must_use]
    pub fn is_settled(self) -> bool {
        self.is_success() || self.is_broken()
    }

    /// `true` for states the merger never leaves a service running through
    /// past a deployment's end.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Broken)
    }

    /// Whether `self -> next` is a legal transition in the state machine.
    /// `Broken` is reachable from every non-terminal state; `Errored` may
    /// retry back into `Starting`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if next == Self::Broken {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Self::New, Self::Installed)
                | (Self::Installed, Self::Starting)
                | (Self::Starting, Self::Running)
                | (Self::Starting, Self::Errored)
                | (Self::Errored, Self::Starting)
                | (Self::Running, Self::Stopping)
                | (Self::Running, Self::Errored)
                | (Self::Errored, Self::Running)
                | (Self::Stopping, Self::Finished)
                | (Self::Stopping, Self::New)
        )
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::New => "NEW",
            Self::Installed => "INSTALLED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Finished => "FINISHED",
            Self::Errored => "ERRORED",
            Self::Broken => "BROKEN",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_and_finished_are_success_states() {
        assert!(ServiceState::Running.is_success());
        assert!(ServiceState::Finished.is_success());
        assert!(!ServiceState::Starting.is_success());
        assert!(!ServiceState::Broken.is_success());
    }

    #[test]
    fn broken_is_reachable_from_any_non_terminal_state() {
        for state in [
            ServiceState::New,
            ServiceState::Installed,
            ServiceState::Starting,
            ServiceState::Running,
            ServiceState::Stopping,
            ServiceState::Errored,
        ] {
            assert!(state.can_transition_to(ServiceState::Broken), "{state} should reach BROKEN");
        }
        assert!(!ServiceState::Finished.can_transition_to(ServiceState::Broken));
        assert!(!ServiceState::Broken.can_transition_to(ServiceState::Broken));
    }

    #[test]
    fn normal_forward_path_is_legal() {
        assert!(ServiceState::New.can_transition_to(ServiceState::Installed));
        assert!(ServiceState::Installed.can_transition_to(ServiceState::Starting));
        assert!(ServiceState::Starting.can_transition_to(ServiceState::Running));
        assert!(ServiceState::Running.can_transition_to(ServiceState::Stopping));
        assert!(ServiceState::Stopping.can_transition_to(ServiceState::Finished));
    }

    #[test]
    fn settled_covers_exactly_success_and_broken() {
        assert!(ServiceState::Running.is_settled());
        assert!(ServiceState::Broken.is_settled());
        assert!(!ServiceState::Starting.is_settled());
    }
}
