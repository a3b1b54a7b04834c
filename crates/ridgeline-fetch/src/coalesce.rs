//! At-most-one-fetch-in-flight coalescing: concurrent requests for the
//! same (name, version) coalesce into a single fetch.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

/// Coalesces concurrent calls for the same key `K` into a single execution
/// of the producing future, fanning the result out to every waiter.
///
/// Only one in-flight entry is tracked per key at a time: once the
/// producing future resolves (success or failure) the slot is cleared, so a
/// later call for the same key runs a fresh fetch rather than replaying a
/// stale result.
pub struct FetchCoalescer<K, V> {
    inflight: DashMap<K, broadcast::Sender<Arc<Result<V, String>>>>,
}

impl<K, V> std::fmt::Debug for FetchCoalescer<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoalescer")
            .field("inflight_count", &self.inflight.len())
            .finish()
    }
}

impl<K, V> Default for FetchCoalescer<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }
}

impl<K, V> FetchCoalescer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `produce` for `key`, or, if another caller is already producing
    /// it, wait for that call's result instead of starting a second fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, produce: F) -> Result<V, String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, String>>,
    {
        enum Slot<V> {
            Joined(broadcast::Receiver<Arc<Result<V, String>>>),
            Owner,
        }

        let slot = match self.inflight.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(e) => Slot::Joined(e.get().subscribe()),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                let (tx, _rx) = broadcast::channel(1);
                e.insert(tx);
                Slot::Owner
            }
        };

        match slot {
            Slot::Joined(mut rx) => match rx.recv().await {
                Ok(result) => (*result).clone(),
                // The producer dropped its sender without sending
                // (panicked); treat as a transient failure so the caller
                // can retry.
                Err(_) => Err("fetch coalescer: producer disappeared".to_string()),
            },
            Slot::Owner => {
                let result = produce().await;
                if let Some((_, sender)) = self.inflight.remove(&key) {
                    let _ = sender.send(Arc::new(result.clone()));
                }
                result
            }
        }
    }
}
