//! Single-flight variation resolution.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::asset::{AssetId, ImageFormat};
use crate::cache::key::{self, VariationKey};
use crate::cache::VariationCache;
use crate::error::{Error, Result};
use crate::store::{shard_path, AssetStore, StoragePath};
use crate::transform::{self, Codec, TransformSpec};

/// A derived image produced (or fetched) by the pipeline.
#[derive(Debug, Clone)]
pub struct Variation {
    pub key: VariationKey,
    pub path: StoragePath,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// File name a variation is stored under: `<key>.<ext>`.
pub fn variation_file_name(key: &VariationKey, format: ImageFormat) -> String {
    format!("{key}.{}", format.extension())
}

/// Compute-or-fetch coordinator for variations.
///
/// Wraps the cache seam with per-key single-flight semantics: a given
/// variation is computed at most once concurrently within this process.
/// Across processes, the double-checked cache probe plus the store's atomic
/// rename keep duplicate computation benign — never corrupting.
pub struct VariationPipeline {
    store: Arc<AssetStore>,
    cache: Arc<dyn VariationCache>,
    codec: Arc<dyn Codec>,
    cache_ttl: Option<Duration>,
    /// Key-scoped locks. Entries are pruned once no resolver holds them, so
    /// the map does not grow with the key space.
    locks: DashMap<VariationKey, Arc<Mutex<()>>>,
    /// Keys derived per asset, for active invalidation on delete.
    derived: DashMap<AssetId, HashSet<(VariationKey, String)>>,
}

impl VariationPipeline {
    pub fn new(
        store: Arc<AssetStore>,
        cache: Arc<dyn VariationCache>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            store,
            cache,
            codec,
            cache_ttl: None,
            locks: DashMap::new(),
            derived: DashMap::new(),
        }
    }

    /// Expire cache entries after `ttl`. Storage stays authoritative, so an
    /// expired entry only costs a disk read on the next resolve.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Resolve a variation: cache probe, then key-locked compute-or-fetch.
    pub async fn resolve(
        &self,
        asset_id: &AssetId,
        spec: &TransformSpec,
    ) -> Result<Variation> {
        spec.validate()?;
        let key = key::derive(asset_id, spec);
        let file_name = variation_file_name(&key, spec.format);

        if let Some(bytes) = self.cache.get(&key).await {
            return Ok(Variation {
                path: StoragePath::new(shard_path(&file_name)),
                key,
                format: spec.format,
                bytes,
            });
        }

        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = self
            .resolve_locked(asset_id, spec, &key, &file_name, &lock)
            .await;

        // Prune the lock entry unless another resolver still holds a clone
        // (map + ours = 2 references).
        self.locks
            .remove_if(&key, |_, holder| Arc::strong_count(holder) <= 2);

        result
    }

    async fn resolve_locked(
        &self,
        asset_id: &AssetId,
        spec: &TransformSpec,
        key: &VariationKey,
        file_name: &str,
        lock: &Arc<Mutex<()>>,
    ) -> Result<Variation> {
        let _guard = lock.lock().await;

        // Double-checked probe: a concurrent holder may have just finished.
        if let Some(bytes) = self.cache.get(key).await {
            debug!(%key, "variation resolved by concurrent holder");
            return Ok(Variation {
                key: key.clone(),
                path: StoragePath::new(shard_path(file_name)),
                format: spec.format,
                bytes,
            });
        }

        // The original is the root of the variation's lifecycle: once it is
        // gone, no variation for it may be served, cached or not.
        if !self.store.contains(asset_id.as_str()).await {
            return Err(Error::NotFound(asset_id.to_string()));
        }

        // Storage is authoritative: a variation already on disk (cache
        // evicted, process restarted) is fetched, not recomputed.
        if self.store.contains(file_name).await {
            match self.store.get(file_name).await {
                Ok(bytes) => {
                    debug!(%key, "repopulating cache from stored variation");
                    self.cache
                        .set(key, bytes.clone(), self.cache_ttl)
                        .await;
                    self.record_derived(asset_id, key, file_name);
                    return Ok(Variation {
                        key: key.clone(),
                        path: StoragePath::new(shard_path(file_name)),
                        format: spec.format,
                        bytes,
                    });
                }
                Err(err) => {
                    warn!(%key, %err, "stored variation unreadable, re-deriving");
                }
            }
        }

        let original = self.store.get(asset_id.as_str()).await?;
        let decoded = self.codec.decode(&original)?;
        let bytes = transform::apply(&decoded, spec, self.codec.as_ref())?;

        let path = self.store.put(file_name, &bytes).await?;
        self.cache.set(key, bytes.clone(), self.cache_ttl).await;
        self.record_derived(asset_id, key, file_name);
        debug!(%asset_id, %key, size = bytes.len(), "generated variation");

        Ok(Variation {
            key: key.clone(),
            path,
            format: spec.format,
            bytes,
        })
    }

    fn record_derived(
        &self,
        asset_id: &AssetId,
        key: &VariationKey,
        file_name: &str,
    ) {
        self.derived
            .entry(asset_id.clone())
            .or_default()
            .insert((key.clone(), file_name.to_string()));
    }

    /// Delete an original and actively invalidate its variations.
    ///
    /// The cache entries must go synchronously (a later resolve must miss);
    /// the on-disk variation sweep is best-effort, since the original's
    /// absence already makes those files unreachable through `resolve`.
    pub async fn delete_asset(&self, asset_id: &AssetId) -> Result<()> {
        self.store.delete(asset_id.as_str()).await?;

        if let Some((_, entries)) = self.derived.remove(asset_id) {
            for (key, file_name) in entries {
                self.cache.remove(&key).await;
                match self.store.delete(&file_name).await {
                    Ok(()) | Err(Error::NotFound(_)) => {}
                    Err(err) => {
                        warn!(%key, %err, "variation sweep failed, leaving orphan");
                    }
                }
            }
        }

        info!(%asset_id, "deleted asset and invalidated variations");
        Ok(())
    }
}

impl fmt::Debug for VariationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariationPipeline")
            .field("store", &self.store)
            .field("cache_ttl", &self.cache_ttl)
            .field("locks_in_flight", &self.locks.len())
            .field("assets_with_variations", &self.derived.len())
            .finish()
    }
}
