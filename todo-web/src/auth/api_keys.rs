//! Service credential allow-list
//!
//! Keys are held as SHA-256 digests and compared in constant time, so the
//! comparison cost does not depend on how much of a key matched.

use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};

/// Accepted `X-API-Key` values
#[derive(Clone, Default)]
pub struct ApiKeyAllowList {
    digests: Vec<[u8; 32]>,
}

impl ApiKeyAllowList {
    /// Build from raw keys; blank entries are ignored
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| Self::digest(&k))
            .collect();

        Self { digests }
    }

    fn digest(key: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.finalize().into()
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Whether `candidate` is one of the configured keys
    pub fn contains(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }

        let candidate = Self::digest(candidate);
        // Every entry is compared, even after a match
        let matched = self
            .digests
            .iter()
            .fold(Choice::from(0), |acc, stored| {
                acc | stored.as_slice().ct_eq(candidate.as_slice())
            });

        matched.into()
    }
}

impl std::fmt::Debug for ApiKeyAllowList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAllowList")
            .field("keys", &self.digests.len())
            .finish()
    }
}
