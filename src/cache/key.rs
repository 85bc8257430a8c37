//! Deterministic variation-key derivation.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::asset::AssetId;
use crate::transform::TransformSpec;

/// Version prefix folded into the hash so a format change in the canonical
/// serialization can invalidate old keys wholesale.
const KEY_VERSION: &str = "v1";

/// Cache key for one (asset, normalized transform) pair.
///
/// Hex SHA-256, so it is bounded in length and safe in file names and URLs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariationKey(String);

impl VariationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VariationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VariationKey").field(&self.0).finish()
    }
}

impl fmt::Display for VariationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for a variation request.
///
/// Pure function of its inputs: the spec is canonicalized first, so requests
/// that differ only in representation collapse to the same key, and the
/// result is stable across process restarts.
pub fn derive(asset_id: &AssetId, spec: &TransformSpec) -> VariationKey {
    let mut hasher = Sha256::new();
    hasher.update(KEY_VERSION.as_bytes());
    hasher.update(b"\n");
    hasher.update(asset_id.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(spec.canonical().as_bytes());
    VariationKey(hex::encode(hasher.finalize()))
}
