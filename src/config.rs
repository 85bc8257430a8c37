//! Startup configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Roots the whole system hangs off: one base directory for sharded
/// storage, one URL prefix for serving.
///
/// Validation is fail-fast at startup: the storage root is checked by
/// [`crate::store::AssetStore::open`] and the URL root by
/// [`crate::url::UrlResolver::new`], both of which surface
/// [`crate::error::Error::Configuration`] before any request is served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage_root: PathBuf,
    pub url_root: String,
    /// Optional TTL for cache entries, in seconds. Storage stays
    /// authoritative either way.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

impl Config {
    pub fn new(storage_root: impl Into<PathBuf>, url_root: impl Into<String>) -> Self {
        Self {
            storage_root: storage_root.into(),
            url_root: url_root.into(),
            cache_ttl_secs: None,
        }
    }

    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = Some(secs);
        self
    }

    pub(crate) fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }
}
