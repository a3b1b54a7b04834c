//! Component identity and version-constraint types.

use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::error::{Context, Error};

/// A component name, e.g. `com.example.HelloWorld`.
///
/// Names are opaque dotted strings; the orchestrator does not interpret
/// the segments, it only uses the whole string as a map key and as the
/// leaf directory name under the component store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentName(String);

impl ComponentName {
    /// Build a `ComponentName`, rejecting names containing path separators
    /// or other characters that would escape the component store's layout.
    pub fn new(raw: impl Into<String>) -> crate::error::Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(Error::InvalidPointer {
                pointer: raw,
                reason: "component name must not be empty".into(),
            });
        }
        if raw.contains(['/', '\\']) || raw.contains("..") {
            return Err(Error::InvalidPointer {
                pointer: raw,
                reason: "component name must not contain path separators".into(),
            });
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ComponentName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ComponentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A `name@version` pair identifying one concrete component build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentIdentifier {
    pub name: ComponentName,
    pub version: Version,
}

impl ComponentIdentifier {
    #[must_use]
    pub fn new(name: ComponentName, version: Version) -> Self {
        Self { name, version }
    }
}

impl fmt::Display for ComponentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A dependency version requirement.
///
/// The wire format is a plain semver requirement string (`^1.2.0`, `>=1.0.0,
/// <2.0.0`, `=1.4.2`, ...); unlike ecosystems with their own constraint
/// grammar, this is a thin, serde-transparent wrapper around
/// [`semver::VersionReq`] so that equality and `Display` round-trip the
/// original text exactly as authored in a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionConstraint {
    raw: String,
    #[serde(skip)]
    parsed: Option<ParsedReq>,
}

#[derive(Debug, Clone)]
struct ParsedReq(VersionReq);

impl PartialEq for ParsedReq {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_string() == other.0.to_string()
    }
}
impl Eq for ParsedReq {}
impl std::hash::Hash for ParsedReq {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_string().hash(state);
    }
}

impl VersionConstraint {
    /// Match-everything constraint, used as the default when a dependency
    /// entry omits a version requirement.
    pub fn any() -> Self {
        Self::new("*").expect("'*' is always a valid requirement")
    }

    pub fn new(raw: impl Into<String>) -> crate::error::Result<Self> {
        let raw = raw.into();
        let req = parse_requirement(&raw)?;
        Ok(Self {
            raw,
            parsed: Some(ParsedReq(req)),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Does `version` satisfy this constraint?
    pub fn matches(&self, version: &Version) -> crate::error::Result<bool> {
        match &self.parsed {
            Some(p) => Ok(p.0.matches(version)),
            None => {
                let req = parse_requirement(&self.raw)?;
                Ok(req.matches(version))
            }
        }
    }
}

/// Normalize a requirement string into something [`semver::VersionReq`]
/// accepts. Recipes commonly author bare versions (`1.2.0` meaning
/// "compatible with 1.2.0", i.e. `^1.2.0`) and the wildcard `*`; both are
/// accepted by `VersionReq` already, so this mostly exists as the single
/// choke point for constraint parsing and its error reporting.
fn parse_requirement(raw: &str) -> crate::error::Result<VersionReq> {
    let trimmed = raw.trim();
    let candidate = if trimmed.is_empty() { "*" } else { trimmed };
    VersionReq::parse(candidate).map_err(|e| Error::InvalidPointer {
        pointer: raw.to_string(),
        reason: Context(e.to_string()).to_string(),
    })
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
