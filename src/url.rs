//! Mapping storage paths to externally reachable URLs.

use ::url::Url;

use crate::error::{Error, Result};
use crate::store::StoragePath;

/// Pure string-join resolver over a configured URL root.
///
/// The root is either an absolute base URL (`https://cdn.example.com/assets`)
/// or a root-relative prefix (`/assets`). Validation happens once at
/// construction; `resolve` itself cannot fail.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    root: String,
}

impl UrlResolver {
    pub fn new(root: &str) -> Result<Self> {
        if root.is_empty() {
            return Err(Error::Configuration(
                "url root must not be empty".to_string(),
            ));
        }

        if !root.starts_with('/') {
            // Absolute roots must parse as real URLs.
            Url::parse(root).map_err(|err| {
                Error::Configuration(format!(
                    "url root {root:?} is neither root-relative nor an absolute URL: {err}"
                ))
            })?;
        }

        Ok(Self {
            root: root.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Join the root with a storage path. No I/O, no failure modes.
    pub fn resolve(&self, path: &StoragePath) -> String {
        format!("{}/{}", self.root, path.to_url_path())
    }
}
