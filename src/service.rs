//! Entry points: upload, variation fetch, promotion, deletion.
//!
//! `AssetService` is the composition root. Store, cache, and codec are
//! constructed once and injected; nothing here reaches for ambient state.

use std::sync::Arc;

use image::GenericImageView;
use tracing::info;

use crate::asset::{AssetId, AssetRecord, ImageFormat};
use crate::cache::{Variation, VariationCache, VariationKey, VariationPipeline};
use crate::config::Config;
use crate::error::Result;
use crate::store::{AssetStore, StoragePath};
use crate::transform::{Codec, TransformSpec};
use crate::url::UrlResolver;

/// A variation plus the URL it is reachable at.
#[derive(Debug, Clone)]
pub struct ServedVariation {
    pub key: VariationKey,
    pub format: ImageFormat,
    pub path: StoragePath,
    pub url: String,
    pub bytes: Vec<u8>,
}

pub struct AssetService {
    store: Arc<AssetStore>,
    codec: Arc<dyn Codec>,
    resolver: UrlResolver,
    pipeline: VariationPipeline,
}

impl AssetService {
    pub fn new(
        store: Arc<AssetStore>,
        cache: Arc<dyn VariationCache>,
        codec: Arc<dyn Codec>,
        resolver: UrlResolver,
    ) -> Self {
        let pipeline =
            VariationPipeline::new(store.clone(), cache, codec.clone());
        Self {
            store,
            codec,
            resolver,
            pipeline,
        }
    }

    /// Build a service from config, failing fast on bad roots.
    pub fn from_config(
        config: &Config,
        cache: Arc<dyn VariationCache>,
        codec: Arc<dyn Codec>,
    ) -> Result<Self> {
        let store = Arc::new(AssetStore::open(&config.storage_root)?);
        let resolver = UrlResolver::new(&config.url_root)?;
        let mut pipeline =
            VariationPipeline::new(store.clone(), cache, codec.clone());
        if let Some(ttl) = config.cache_ttl() {
            pipeline = pipeline.with_cache_ttl(ttl);
        }
        Ok(Self {
            store,
            codec,
            resolver,
            pipeline,
        })
    }

    /// Store an uploaded image permanently and assign it an identifier.
    ///
    /// The format is sniffed from magic bytes, with the caller's declared
    /// format as fallback; the bytes must decode, but are stored exactly as
    /// received — originals are immutable.
    pub async fn upload(
        &self,
        bytes: &[u8],
        declared: Option<ImageFormat>,
    ) -> Result<AssetRecord> {
        self.store_new(bytes, declared, false).await
    }

    /// Store an uploaded image in the staging tree; see
    /// [`AssetService::promote`].
    pub async fn upload_temporary(
        &self,
        bytes: &[u8],
        declared: Option<ImageFormat>,
    ) -> Result<AssetRecord> {
        self.store_new(bytes, declared, true).await
    }

    async fn store_new(
        &self,
        bytes: &[u8],
        declared: Option<ImageFormat>,
        temporary: bool,
    ) -> Result<AssetRecord> {
        let format = match ImageFormat::sniff(bytes) {
            Ok(format) => format,
            Err(err) => declared.ok_or(err)?,
        };
        let decoded = self.codec.decode(bytes)?;

        let id = AssetId::generate();
        let path = if temporary {
            self.store.put_temporary(id.as_str(), bytes).await?
        } else {
            self.store.put(id.as_str(), bytes).await?
        };
        let url = self.resolver.resolve(&path);

        info!(%id, %format, temporary, size = bytes.len(), "stored asset");
        Ok(AssetRecord {
            id,
            format,
            url,
            byte_len: bytes.len() as u64,
            width: decoded.width(),
            height: decoded.height(),
            path,
            temporary,
        })
    }

    /// Move a staged asset into the permanent tree. No-op if already
    /// permanent.
    pub async fn promote(&self, id: &AssetId) -> Result<StoragePath> {
        self.store.promote(id.as_str()).await
    }

    /// Read back an original's bytes.
    pub async fn original(&self, id: &AssetId) -> Result<Vec<u8>> {
        self.store.get(id.as_str()).await
    }

    /// Resolve a variation and its servable URL.
    pub async fn fetch_variation(
        &self,
        id: &AssetId,
        spec: &TransformSpec,
    ) -> Result<ServedVariation> {
        let Variation {
            key,
            path,
            format,
            bytes,
        } = self.pipeline.resolve(id, spec).await?;
        let url = self.resolver.resolve(&path);
        Ok(ServedVariation {
            key,
            format,
            path,
            url,
            bytes,
        })
    }

    /// Remove an original and invalidate everything derived from it.
    pub async fn delete(&self, id: &AssetId) -> Result<()> {
        self.pipeline.delete_asset(id).await
    }

    /// URL for any stored path (original or variation).
    pub fn url_for(&self, path: &StoragePath) -> String {
        self.resolver.resolve(path)
    }
}

impl std::fmt::Debug for AssetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetService")
            .field("store", &self.store)
            .field("resolver", &self.resolver)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
