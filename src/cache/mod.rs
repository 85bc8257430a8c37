//! Variation cache: the external cache seam, an in-memory implementation,
//! key derivation, and the single-flight coordinator.

mod coordinator;
pub mod key;

pub use coordinator::{Variation, VariationPipeline};
pub use key::VariationKey;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

/// Get/set seam over any backing cache.
///
/// The pipeline only requires that absence is observable; eviction policy is
/// the implementation's business, and correctness never depends on cache
/// contents — storage stays authoritative.
#[async_trait]
pub trait VariationCache: Send + Sync {
    async fn get(&self, key: &VariationKey) -> Option<Vec<u8>>;

    async fn set(&self, key: &VariationKey, bytes: Vec<u8>, ttl: Option<Duration>);

    async fn remove(&self, key: &VariationKey);
}

struct Entry {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

/// Process-local cache backed by a concurrent map, with lazy TTL eviction.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<VariationKey, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl VariationCache for MemoryCache {
    async fn get(&self, key: &VariationKey) -> Option<Vec<u8>> {
        {
            let entry = self.entries.get(key)?;
            match entry.expires_at {
                Some(deadline) if Instant::now() >= deadline => {}
                _ => return Some(entry.bytes.clone()),
            }
            // Expired: fall through, dropping the shard guard first.
        }
        self.entries.remove(key);
        None
    }

    async fn set(
        &self,
        key: &VariationKey,
        bytes: Vec<u8>,
        ttl: Option<Duration>,
    ) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.clone(), Entry { bytes, expires_at });
    }

    async fn remove(&self, key: &VariationKey) {
        self.entries.remove(key);
    }
}
