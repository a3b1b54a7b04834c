//! Digest computation and verification for fetched bytes.
//!
//! Recipes declare artifact digests as `<algorithm>:<hex>` (e.g.
//! `sha256:abcd...`); `blake3` is accepted too since the store uses it
//! internally for content-addressed staging paths, but `sha256` is what
//! recipes are expected to author since it matches the signing pipeline
//! out of scope here.

use ridgeline_core::{Error, Result};
use sha2::{Digest as _, Sha256};

/// A parsed `<algorithm>:<hex>` digest expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub algorithm: Algorithm,
    pub hex: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha256,
    Blake3,
}

impl Digest {
    pub fn parse(raw: &str) -> Result<Self> {
        let (algo, hex) = raw.split_once(':').ok_or_else(|| {
            Error::DigestMismatch {
                name: String::new(),
                version: String::new(),
                expected: raw.to_string(),
                actual: "<unparseable digest spec>".to_string(),
            }
        })?;
        let algorithm = match algo {
            "sha256" => Algorithm::Sha256,
            "blake3" => Algorithm::Blake3,
            other => {
                return Err(Error::DigestMismatch {
                    name: String::new(),
                    version: String::new(),
                    expected: raw.to_string(),
                    actual: format!("<unsupported algorithm '{other}'>"),
                })
            }
        };
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    fn compute(&self, data: &[u8]) -> String {
        match self.algorithm {
            Algorithm::Sha256 => hex::encode(Sha256::digest(data)),
            Algorithm::Blake3 => blake3::hash(data).to_hex().to_string(),
        }
    }
}

/// Verify that `data` matches the digest declared on an artifact (`name`,
/// `version` are carried only for the error message).
pub fn verify_digest(name: &str, version: &str, declared: &str, data: &[u8]) -> Result<()> {
    let digest = Digest::parse(declared)?;
    let actual = digest.compute(data);
    if actual == digest.hex {
        Ok(())
    } else {
        Err(Error::DigestMismatch {
            name: name.to_string(),
            version: version.to_string(),
            expected: digest.hex,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        let data = b"hello world";
        let expected = hex::encode(Sha256::digest(data));
        verify_digest("n", "1.0.0", &format!("sha256:{expected}"), data).unwrap();
    }

    #[test]
    fn mismatch_is_reported() {
        let data = b"hello world";
        let err = verify_digest("n", "1.0.0", "sha256:00000000", data).unwrap_err();
        assert!(matches!(err, Error::DigestMismatch { .. }));
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let err = Digest::parse("md5:abc").unwrap_err();
        assert!(matches!(err, Error::DigestMismatch { .. }));
    }

    #[test]
    fn blake3_roundtrips() {
        let data = b"payload";
        let expected = blake3::hash(data).to_hex().to_string();
        verify_digest("n", "1.0.0", &format!("blake3:{expected}"), data).unwrap();
    }
}
