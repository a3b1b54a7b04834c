//! RESET semantics.
//!
//! For each pointer `p`:
//! - `p == ""` replaces the whole document with defaults.
//! - `p` pointing into an array is disallowed (no-op, logged).
//! - otherwise, if the default has a value at `p`, the key is replaced with
//!   the default subtree; if the default has no value there, the key is
//!   removed entirely.
//! - a missing or scalar parent is a no-op (logged).

use ridgeline_core::ConfigValue;
use tracing::warn;

/// Apply every pointer in `pointers` to `current`, using `defaults` as the
/// source of truth for what a reset key reverts to.
pub fn apply_reset(current: &mut ConfigValue, defaults: &ConfigValue, pointers: &[String]) {
    for pointer in pointers {
        apply_one(current, defaults, pointer);
    }
}

fn apply_one(current: &mut ConfigValue, defaults: &ConfigValue, pointer: &str) {
    if pointer.is_empty() {
        *current = defaults.clone();
        return;
    }

    let Some((parent_pointer, key)) = split_last(pointer) else {
        warn!(pointer, "malformed reset pointer, ignoring");
        return;
    };

    if points_into_array(current, &parent_pointer) {
        warn!(pointer, "reset pointer targets an array element, ignoring");
        return;
    }

    let Some(parent) = current.pointer_mut(&parent_pointer) else {
        warn!(pointer, "reset pointer's parent does not exist, ignoring");
        return;
    };
    let Some(parent_map) = parent.as_object_mut() else {
        warn!(pointer, "reset pointer's parent is not an object, ignoring");
        return;
    };

    match defaults.pointer(pointer) {
        Some(default_value) => {
            parent_map.insert(key, default_value.clone());
        }
        None => {
            parent_map.remove(&key);
        }
    }
}

/// `true` if the pointer's *parent segment* resolves to an array, meaning
/// the final token would be interpreted as an array index (disallowed by
/// spec: "p points to an array element ⇒ disallowed").
fn points_into_array(current: &ConfigValue, parent_pointer: &str) -> bool {
    matches!(current.pointer(parent_pointer), Some(ConfigValue::Array(_)))
}

fn split_last(pointer: &str) -> Option<(String, String)> {
    if !pointer.starts_with('/') {
        return None;
    }
    let idx = pointer.rfind('/')?;
    let parent = pointer[..idx].to_string();
    let last = pointer[idx + 1..].replace("~1", "/").replace("~0", "~");
    Some((parent, last))
}
