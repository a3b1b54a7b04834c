//! `ConfigValue`: the dynamic tree used for component configuration.
//!
//! Recipes, deployment documents and the persisted configuration store all
//! speak a small, untyped tree shape (object / array / string / number /
//! bool / null). We model it as our own tagged enum rather than passing
//! `serde_json::Value` or `sonic_rs::Value` around so that the merge and
//! interpolation engines in `ridgeline-config` own a stable, ordered
//! representation independent of whichever JSON crate sits at the I/O
//! boundary (see [`crate::json`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The dynamic configuration tree.
///
/// Objects preserve key order via [`BTreeMap`] for deterministic
/// serialization; this trades hash-map lookup speed (configuration trees
/// are small) for reproducible diffs and snapshot output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Object(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    #[must_use]
    pub fn object() -> Self {
        Self::Object(BTreeMap::new())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            Self::Object(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, ConfigValue>> {
        match self {
            Self::Object(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Resolve an [RFC 6901](https://www.rfc-editor.org/rfc/rfc6901) JSON
    /// pointer against this value. An empty pointer (`""`) resolves to the
    /// whole document. Returns `None` when the path does not exist, rather
    /// than erroring, since "key absent" is a normal outcome during
    /// interpolation lookups.
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&ConfigValue> {
        if pointer.is_empty() {
            return Some(self);
        }
        if !pointer.starts_with('/') {
            return None;
        }
        let mut current = self;
        for raw_token in pointer.split('/').skip(1) {
            let token = unescape_token(raw_token);
            current = match current {
                Self::Object(map) => map.get(&token)?,
                Self::Array(items) => {
                    let index: usize = token.parse().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable variant of [`Self::pointer`] that does not create missing
    /// path segments; returns `None` exactly where [`Self::pointer`] would
    /// return `None`.
    pub fn pointer_mut(&mut self, pointer: &str) -> Option<&mut ConfigValue> {
        if pointer.is_empty() {
            return Some(self);
        }
        if !pointer.starts_with('/') {
            return None;
        }
        let mut current = self;
        for raw_token in pointer.split('/').skip(1) {
            let token = unescape_token(raw_token);
            current = match current {
                Self::Object(map) => map.get_mut(&token)?,
                Self::Array(items) => {
                    let index: usize = token.parse().ok()?;
                    items.get_mut(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable variant of [`Self::pointer`], creating intermediate objects
    /// as needed (arrays are never auto-created; indexing into a
    /// non-existent array slot is an error).
    pub fn pointer_mut_or_create(&mut self, pointer: &str) -> Result<&mut ConfigValue> {
        if pointer.is_empty() {
            return Ok(self);
        }
        if !pointer.starts_with('/') {
            return Err(Error::InvalidPointer {
                pointer: pointer.to_string(),
                reason: "pointer must be empty or start with '/'".into(),
            });
        }
        let mut current = self;
        for raw_token in pointer.split('/').skip(1) {
            let token = unescape_token(raw_token);
            if !matches!(current, Self::Object(_)) {
                if current.is_null() {
                    *current = Self::object();
                } else {
                    return Err(Error::InvalidPointer {
                        pointer: pointer.to_string(),
                        reason: format!("segment '{token}' traverses a non-object value"),
                    });
                }
            }
            let map = current.as_object_mut().expect("just ensured object");
            current = map.entry(token).or_insert(Self::Null);
        }
        Ok(current)
    }

    /// Set the value at `pointer`, creating intermediate objects as needed.
    pub fn set_pointer(&mut self, pointer: &str, value: ConfigValue) -> Result<()> {
        if pointer.is_empty() {
            *self = value;
            return Ok(());
        }
        let (parent_pointer, last) = split_last_token(pointer)?;
        let parent = self.pointer_mut_or_create(&parent_pointer)?;
        if !matches!(parent, Self::Object(_)) {
            *parent = Self::object();
        }
        parent
            .as_object_mut()
            .expect("just ensured object")
            .insert(last, value);
        Ok(())
    }

    /// Deep-merge `patch` into `self` in place, following MERGE semantics:
    /// objects merge key-by-key recursively, any other value type
    /// (including arrays) replaces the existing value wholesale.
    pub fn merge_in_place(&mut self, patch: &ConfigValue) {
        match (self, patch) {
            (Self::Object(base), Self::Object(incoming)) => {
                for (key, incoming_value) in incoming {
                    match base.get_mut(key) {
                        Some(existing) => existing.merge_in_place(incoming_value),
                        None => {
                            base.insert(key.clone(), incoming_value.clone());
                        }
                    }
                }
            }
            (base, patch) => {
                *base = patch.clone();
            }
        }
    }
}

fn split_last_token(pointer: &str) -> Result<(String, String)> {
    let idx = pointer.rfind('/').ok_or_else(|| Error::InvalidPointer {
        pointer: pointer.to_string(),
        reason: "pointer must start with '/'".into(),
    })?;
    let parent = pointer[..idx].to_string();
    let last = unescape_token(&pointer[idx + 1..]);
    Ok((parent, last))
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Array(_) | Self::Object(_) => {
                let json = crate::json::to_json(self).unwrap_or_default();
                write!(f, "{json}")
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, ConfigValue)]) -> ConfigValue {
        ConfigValue::Object(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn pointer_traverses_nested_objects() {
        let doc = obj(&[(
            "a",
            obj(&[("b", ConfigValue::String("hi".into()))]),
        )]);
        assert_eq!(doc.pointer("/a/b"), Some(&ConfigValue::String("hi".into())));
        assert_eq!(doc.pointer("/a/missing"), None);
    }

    #[test]
    fn pointer_traverses_arrays() {
        let doc = ConfigValue::Array(vec!["x".into(), "y".into()]);
        assert_eq!(doc.pointer("/1"), Some(&ConfigValue::String("y".into())));
        assert_eq!(doc.pointer("/5"), None);
    }

    #[test]
    fn set_pointer_creates_intermediate_objects() {
        let mut doc = ConfigValue::object();
        doc.set_pointer("/a/b/c", ConfigValue::Number(1.0)).unwrap();
        assert_eq!(doc.pointer("/a/b/c"), Some(&ConfigValue::Number(1.0)));
    }

    #[test]
    fn merge_recurses_into_objects_but_replaces_scalars_and_arrays() {
        let mut base = obj(&[
            ("keep", ConfigValue::Number(1.0)),
            ("nested", obj(&[("x", ConfigValue::Number(1.0))])),
            ("list", ConfigValue::Array(vec![ConfigValue::Number(1.0)])),
        ]);
        let patch = obj(&[
            ("nested", obj(&[("y", ConfigValue::Number(2.0))])),
            ("list", ConfigValue::Array(vec![ConfigValue::Number(9.0)])),
        ]);
        base.merge_in_place(&patch);

        assert_eq!(base.pointer("/keep"), Some(&ConfigValue::Number(1.0)));
        assert_eq!(base.pointer("/nested/x"), Some(&ConfigValue::Number(1.0)));
        assert_eq!(base.pointer("/nested/y"), Some(&ConfigValue::Number(2.0)));
        assert_eq!(
            base.pointer("/list"),
            Some(&ConfigValue::Array(vec![ConfigValue::Number(9.0)]))
        );
    }

    #[test]
    fn unescapes_tilde_and_slash_tokens() {
        let doc = obj(&[("a/b", ConfigValue::String("v".into()))]);
        assert_eq!(doc.pointer("/a~1b"), Some(&ConfigValue::String("v".into())));
    }
}
