//! Local-disk asset store and on-demand image variation engine.
//!
//! Originals are immutable blobs in a sharded directory tree; variations
//! (resize/crop/transcode) are derived lazily, persisted next to the
//! originals, and fronted by a pluggable cache with single-flight
//! semantics — a given variation is computed at most once concurrently.
//!
//! The pieces compose explicitly, with no ambient globals:
//!
//! - [`store::AssetStore`] owns on-disk bytes and atomic write semantics
//! - [`cache::VariationPipeline`] is the compute-or-fetch coordinator
//! - [`transform`] holds the pure spec/geometry engine and the codec seam
//! - [`url::UrlResolver`] maps storage paths to servable URLs
//! - [`service::AssetService`] wires them together as the entry-point API

pub mod asset;
pub mod cache;
pub mod config;
pub mod error;
pub mod service;
pub mod store;
pub mod transform;
pub mod url;

pub use asset::{AssetId, AssetRecord, ImageFormat};
pub use cache::{
    MemoryCache, Variation, VariationCache, VariationKey, VariationPipeline,
};
pub use config::Config;
pub use error::{Error, Result};
pub use service::{AssetService, ServedVariation};
pub use store::{AssetStore, StoragePath, shard_path};
pub use transform::{Codec, CropMode, ImageCodec, TransformSpec};
pub use url::UrlResolver;
