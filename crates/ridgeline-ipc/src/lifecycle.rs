//! The lifecycle subscription channel: emits `PreComponentUpdate`
//! and accepts `DeferComponentUpdate`. These mirror
//! `ridgeline_lifecycle::{PreComponentUpdate, DeferComponentUpdate}`
//! field-for-field but are the serializable, transport-facing shapes —
//! the lifecycle crate's types carry a `ComponentName` directly and are
//! not meant to cross a wire boundary on their own.

use std::time::Duration;

use ridgeline_core::ComponentName;
use ridgeline_lifecycle::{DeferComponentUpdate as CoreDefer, PreComponentUpdate as CorePreUpdate};
use serde::{Deserialize, Serialize};

use crate::IdempotencyKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreComponentUpdate {
    pub component_name: ComponentName,
}

impl From<CorePreUpdate> for PreComponentUpdate {
    fn from(event: CorePreUpdate) -> Self {
        Self {
            component_name: event.component,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferComponentUpdate {
    pub component_name: ComponentName,
    pub defer_millis: u64,
}

impl IdempotencyKey for DeferComponentUpdate {
    fn idempotency_key(&self) -> &str {
        self.component_name.as_str()
    }
}

impl From<DeferComponentUpdate> for CoreDefer {
    fn from(value: DeferComponentUpdate) -> Self {
        CoreDefer {
            component: value.component_name,
            defer_for: Duration::from_millis(value.defer_millis),
        }
    }
}

/// Either side of the subscription channel, framed as one enum for
/// transports that multiplex both directions over a single stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LifecycleEvent {
    PreUpdate(PreComponentUpdate),
    Defer(DeferComponentUpdate),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defer_converts_millis_into_a_duration() {
        let wire = DeferComponentUpdate {
            component_name: ComponentName::new("App").unwrap(),
            defer_millis: 60_000,
        };
        let core: CoreDefer = wire.into();
        assert_eq!(core.defer_for, Duration::from_secs(60));
    }
}
