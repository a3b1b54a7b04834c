//! JSON encode/decode helpers used at I/O boundaries (IPC payloads,
//! persisted deployment documents, recipe `Value` blocks).
//!
//! Internal structural work (merging, interpolation) operates on
//! [`crate::value::ConfigValue`] directly; these helpers exist for the
//! edges where we read bytes from disk/the wire or need to write them back
//! out. We use `sonic-rs` for the hot parse/serialize path, falling back to
//! nothing else: if `sonic-rs` cannot represent a value we treat that as a
//! bug, not a compatibility concern.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Parse a JSON string into `T`.
pub fn from_json<T: DeserializeOwned>(input: &str) -> Result<T> {
    sonic_rs::from_str(input).map_err(|e| Error::Json(to_serde_json_error(&e)))
}

/// Parse JSON bytes into `T`.
pub fn from_json_slice<T: DeserializeOwned>(input: &[u8]) -> Result<T> {
    sonic_rs::from_slice(input).map_err(|e| Error::Json(to_serde_json_error(&e)))
}

/// Serialize `value` to a compact JSON string.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    sonic_rs::to_string(value).map_err(|e| Error::Json(to_serde_json_error(&e)))
}

/// Serialize `value` to a pretty-printed JSON string, used for snapshot
/// files and CLI `--format json` output where humans read the result.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    sonic_rs::to_string_pretty(value).map_err(|e| Error::Json(to_serde_json_error(&e)))
}

/// `sonic_rs::Error` does not implement `Into<serde_json::Error>`; since
/// `Error::Json` is typed over the latter for compatibility with
/// `serde_json`-based callers (tests, other crates), we re-wrap the
/// message rather than leak a `sonic_rs`-specific error type across the
/// workspace boundary.
fn to_serde_json_error(e: &sonic_rs::Error) -> serde_json::Error {
    serde::de::Error::custom(e.to_string())
}
