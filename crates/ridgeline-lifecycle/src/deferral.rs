//! Phase 3: the update-check vote, implemented as message passing. The
//! merger publishes an event on a channel, waits with a bounded timeout
//! for per-subscriber deferral responses, then resumes.

use std::time::Duration;

use ridgeline_core::ComponentName;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Published to every subscriber when a component is about to be stopped
/// or reconfigured.
#[derive(Debug, Clone)]
pub struct PreComponentUpdate {
    pub component: ComponentName,
}

/// A subscriber's cooperative request to postpone the pending update.
/// Deferral is a hint, not a veto.
#[derive(Debug, Clone)]
pub struct DeferComponentUpdate {
    pub component: ComponentName,
    pub defer_for: Duration,
}

/// Publishes `PreComponentUpdate` events and collects `DeferComponentUpdate`
/// responses for a bounded window.
pub struct DeferralCoordinator {
    updates: broadcast::Sender<PreComponentUpdate>,
    deferrals_tx: mpsc::UnboundedSender<DeferComponentUpdate>,
    deferrals_rx: mpsc::UnboundedReceiver<DeferComponentUpdate>,
}

impl DeferralCoordinator {
    #[must_use]
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(64);
        let (deferrals_tx, deferrals_rx) = mpsc::unbounded_channel();
        Self {
            updates,
            deferrals_tx,
            deferrals_rx,
        }
    }

    /// Subscribe to `PreComponentUpdate` notifications (a running service
    /// would hold this, reply via a clone of the sender obtained through
    /// [`Self::deferral_sender`]).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PreComponentUpdate> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn deferral_sender(&self) -> mpsc::UnboundedSender<DeferComponentUpdate> {
        self.deferrals_tx.clone()
    }

    /// Notify every subscriber that `component` is about to be stopped or
    /// reconfigured. Components in `skip_notify` (spec
    /// `componentUpdatePolicy.skipNotifyComponents`) are never notified.
    pub fn notify(&self, component: &ComponentName, skip_notify: &[ComponentName]) {
        if skip_notify.contains(component) {
            return;
        }
        let _ = self.updates.send(PreComponentUpdate {
            component: component.clone(),
        });
    }

    /// Collect every deferral that arrives within `window`, then return the
    /// largest requested delay, if any: if any component defers, the
    /// merge reschedules after the largest returned deferral interval.
    pub async fn collect_votes(&mut self, window: Duration) -> Option<Duration> {
        let deadline = tokio::time::Instant::now() + window;
        let mut longest: Option<Duration> = None;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.deferrals_rx.recv()).await {
                Ok(Some(vote)) => {
                    debug!(component = %vote.component, defer_for = ?vote.defer_for, "received deferral vote");
                    longest = Some(longest.map_or(vote.defer_for, |l| l.max(vote.defer_for)));
                }
                Ok(None) | Err(_) => break,
            }
        }
        longest
    }
}

impl Default for DeferralCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ComponentName {
        ComponentName::new(s).unwrap()
    }

    #[tokio::test]
    async fn no_votes_within_window_returns_none() {
        let mut coordinator = DeferralCoordinator::new();
        let longest = coordinator.collect_votes(Duration::from_millis(20)).await;
        assert!(longest.is_none());
    }

    #[tokio::test]
    async fn collects_the_largest_deferral_among_several() {
        let mut coordinator = DeferralCoordinator::new();
        let sender = coordinator.deferral_sender();
        sender
            .send(DeferComponentUpdate {
                component: name("A"),
                defer_for: Duration::from_secs(5),
            })
            .unwrap();
        sender
            .send(DeferComponentUpdate {
                component: name("B"),
                defer_for: Duration::from_secs(60),
            })
            .unwrap();

        let longest = coordinator.collect_votes(Duration::from_millis(50)).await;
        assert_eq!(longest, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn skip_notify_components_never_receive_the_event() {
        let coordinator = DeferralCoordinator::new();
        let mut rx = coordinator.subscribe();
        coordinator.notify(&name("Quiet"), &[name("Quiet")]);
        coordinator.notify(&name("Loud"), &[]);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.component, name("Loud"));
    }
}
