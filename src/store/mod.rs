//! Local-disk asset storage.
//!
//! Owns the on-disk layout: a sharded tree of immutable blobs plus a `tmp/`
//! staging tree with the same shape. All writes are atomic (temp file +
//! rename) so concurrent readers never observe partial content.

mod shard;

pub use shard::shard_path;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Name of the staging subtree for not-yet-permanent assets.
const TMP_DIR: &str = "tmp";

/// Relative path of a stored blob under the storage root.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoragePath(PathBuf);

impl StoragePath {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Forward-slash form for URL joining, regardless of platform.
    pub fn to_url_path(&self) -> String {
        let parts: Vec<String> = self
            .0
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        parts.join("/")
    }
}

impl fmt::Debug for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StoragePath").field(&self.0).finish()
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url_path())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Area {
    Permanent,
    Temporary,
}

/// File-backed store for immutable blobs keyed by file name.
///
/// The mapping from file name to relative path is the pure [`shard_path`]
/// function; this type only adds I/O on top of it.
#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Open a store rooted at `root`, creating the root and staging trees.
    ///
    /// Runs synchronously at startup so a misconfigured root fails fast
    /// before any request is served.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [root.clone(), root.join(TMP_DIR)] {
            std::fs::create_dir_all(&dir).map_err(|err| {
                Error::Configuration(format!(
                    "cannot create storage root {}: {err}",
                    dir.display()
                ))
            })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative(&self, area: Area, file_name: &str) -> StoragePath {
        let sharded = shard_path(file_name);
        match area {
            Area::Permanent => StoragePath::new(sharded),
            Area::Temporary => {
                StoragePath::new(PathBuf::from(TMP_DIR).join(sharded))
            }
        }
    }

    fn absolute(&self, path: &StoragePath) -> PathBuf {
        self.root.join(path.as_path())
    }

    /// Write a blob into the permanent tree. See [`AssetStore::put_in`].
    pub async fn put(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<StoragePath> {
        self.put_in(Area::Permanent, file_name, bytes).await
    }

    /// Write a blob into the staging tree.
    pub async fn put_temporary(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<StoragePath> {
        self.put_in(Area::Temporary, file_name, bytes).await
    }

    /// Atomic write: temp file in the destination directory, flush, rename.
    ///
    /// If the destination appears while we are writing, the temp is
    /// discarded and the existing blob wins. Blobs are immutable and named
    /// deterministically, so the loser's content is identical.
    async fn put_in(
        &self,
        area: Area,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<StoragePath> {
        let rel = self.relative(area, file_name);
        let dest = self.absolute(&rel);
        let parent = dest
            .parent()
            .ok_or_else(|| {
                Error::StorageWrite(format!(
                    "destination has no parent: {}",
                    dest.display()
                ))
            })?
            .to_path_buf();

        tokio::fs::create_dir_all(&parent).await.map_err(|err| {
            Error::StorageWrite(format!(
                "cannot create shard dir {}: {err}",
                parent.display()
            ))
        })?;

        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            return Ok(rel);
        }

        let tmp =
            parent.join(format!("{file_name}.tmp-{}", Uuid::new_v4().simple()));

        let mut file = tokio::fs::File::create(&tmp).await.map_err(|err| {
            Error::StorageWrite(format!(
                "cannot create temp file {}: {err}",
                tmp.display()
            ))
        })?;
        let write_result = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;
        drop(file);

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::StorageWrite(format!(
                "write to {} failed: {err}",
                tmp.display()
            )));
        }

        // Another writer may have won while we streamed the bytes out.
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Ok(rel);
        }

        tokio::fs::rename(&tmp, &dest).await.map_err(|err| {
            Error::StorageWrite(format!(
                "cannot move {} into place: {err}",
                tmp.display()
            ))
        })?;

        debug!(file_name, path = %rel, "stored blob");
        Ok(rel)
    }

    /// Read a blob, checking the permanent tree first, then staging.
    pub async fn get(&self, file_name: &str) -> Result<Vec<u8>> {
        let path = self
            .locate(file_name)
            .await
            .ok_or_else(|| Error::NotFound(file_name.to_string()))?;
        tokio::fs::read(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(file_name.to_string())
            } else {
                Error::StorageRead(format!(
                    "cannot read {}: {err}",
                    path.display()
                ))
            }
        })
    }

    /// Whether a blob exists in either tree.
    pub async fn contains(&self, file_name: &str) -> bool {
        self.locate(file_name).await.is_some()
    }

    /// Remove a blob from whichever tree holds it.
    ///
    /// Fails with [`Error::NotFound`] when absent; callers treating delete
    /// as best-effort tolerate that case explicitly.
    pub async fn delete(&self, file_name: &str) -> Result<()> {
        let path = self
            .locate(file_name)
            .await
            .ok_or_else(|| Error::NotFound(file_name.to_string()))?;
        tokio::fs::remove_file(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(file_name.to_string())
            } else {
                Error::StorageWrite(format!(
                    "cannot remove {}: {err}",
                    path.display()
                ))
            }
        })?;
        debug!(file_name, "deleted blob");
        Ok(())
    }

    /// Move a staged blob into the permanent tree.
    ///
    /// No-op when the blob is already permanent; [`Error::NotFound`] when it
    /// exists in neither tree.
    pub async fn promote(&self, file_name: &str) -> Result<StoragePath> {
        let permanent_rel = self.relative(Area::Permanent, file_name);
        let permanent = self.absolute(&permanent_rel);
        if tokio::fs::try_exists(&permanent).await.unwrap_or(false) {
            return Ok(permanent_rel);
        }

        let staged = self.absolute(&self.relative(Area::Temporary, file_name));
        if !tokio::fs::try_exists(&staged).await.unwrap_or(false) {
            return Err(Error::NotFound(file_name.to_string()));
        }

        if let Some(parent) = permanent.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                Error::StorageWrite(format!(
                    "cannot create shard dir {}: {err}",
                    parent.display()
                ))
            })?;
        }
        tokio::fs::rename(&staged, &permanent).await.map_err(|err| {
            Error::StorageWrite(format!(
                "cannot promote {}: {err}",
                staged.display()
            ))
        })?;
        debug!(file_name, "promoted staged blob");
        Ok(permanent_rel)
    }

    async fn locate(&self, file_name: &str) -> Option<PathBuf> {
        for area in [Area::Permanent, Area::Temporary] {
            let path = self.absolute(&self.relative(area, file_name));
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Some(path);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, AssetStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let (_dir, store) = store();
        let path = store.put("blob-a", b"hello").await.unwrap();
        assert_eq!(path.as_path().components().count(), 3);
        assert_eq!(store.get("blob-a").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (_dir, store) = store();
        match store.get("nope").await {
            Err(Error::NotFound(name)) => assert_eq!(name, "nope"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.delete("nope").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn put_leaves_no_temp_files() {
        let (dir, store) = store();
        let rel = store.put("blob-b", &[7u8; 4096]).await.unwrap();
        let shard_dir = dir.path().join(rel.as_path().parent().unwrap());
        let mut entries = tokio::fs::read_dir(&shard_dir).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["blob-b".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_puts_of_same_blob_both_succeed() {
        let (_dir, store) = store();
        let bytes = vec![42u8; 1 << 16];
        let (a, b) = tokio::join!(
            store.put("same", &bytes),
            store.put("same", &bytes)
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(store.get("same").await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn staged_blobs_are_readable_and_promotable() {
        let (dir, store) = store();
        let staged = store.put_temporary("blob-c", b"staged").await.unwrap();
        assert!(staged.as_path().starts_with("tmp"));
        assert_eq!(store.get("blob-c").await.unwrap(), b"staged");

        let promoted = store.promote("blob-c").await.unwrap();
        assert!(!promoted.as_path().starts_with("tmp"));
        assert!(!dir.path().join(staged.as_path()).exists());
        assert_eq!(store.get("blob-c").await.unwrap(), b"staged");

        // Promoting again is a no-op.
        assert_eq!(store.promote("blob-c").await.unwrap(), promoted);
    }

    #[tokio::test]
    async fn promote_missing_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.promote("nope").await,
            Err(Error::NotFound(_))
        ));
    }
}
