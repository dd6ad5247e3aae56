//! Filesystem blob cache for downloaded album assets.
//!
//! One flat directory per album instance under an injected cache root; blobs
//! are named `{photoGuid}.jpg`. No sidecar metadata — identifiers are
//! globally unique within an album, so the filename is the whole index.
//!
//! The directory is shared between the sync path (writer/deleter) and the
//! selection path (lister/reader). Writes go through a temp file and rename
//! so a concurrent reader never observes a torn blob; readers tolerate a
//! listed blob vanishing before the read (see the selector's bounded retry).

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

const BLOB_EXT: &str = "jpg";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// True when the underlying failure is a missing file — the signature of
    /// a blob deleted between listing and reading.
    pub fn is_not_found(&self) -> bool {
        let CacheError::Io { source, .. } = self;
        source.kind() == ErrorKind::NotFound
    }
}

/// Content cache for one album instance.
#[derive(Debug)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    /// Open the store at `cache_root/{instance}`, creating the directory
    /// if needed.
    pub async fn open(cache_root: &Path, instance: &str) -> Result<Self, CacheError> {
        let dir = cache_root.join(instance);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{BLOB_EXT}"))
    }

    pub async fn has(&self, id: &str) -> bool {
        fs::try_exists(self.blob_path(id)).await.unwrap_or(false)
    }

    /// Write a blob for `id`. Idempotent: an existing entry is left
    /// untouched so an unchanged asset is never transferred or rewritten.
    pub async fn write(&self, id: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.blob_path(id);
        if self.has(id).await {
            debug!(id, "blob already cached, skipping write");
            return Ok(());
        }
        let part = self.dir.join(format!("{id}.part"));
        fs::write(&part, bytes)
            .await
            .map_err(|e| CacheError::io(&part, e))?;
        fs::rename(&part, &path)
            .await
            .map_err(|e| CacheError::io(&path, e))?;
        Ok(())
    }

    pub async fn read(&self, id: &str) -> Result<Vec<u8>, CacheError> {
        let path = self.blob_path(id);
        fs::read(&path).await.map_err(|e| CacheError::io(&path, e))
    }

    /// List cached identifiers in stable (lexicographic) order.
    ///
    /// Files that do not parse as `{id}.jpg` are logged and skipped — never
    /// deleted, since nothing here can attribute them to an identifier.
    pub async fn list(&self) -> Result<BTreeSet<String>, CacheError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;
        let mut ids = BTreeSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXT) {
                debug!(path = %path.display(), "ignoring non-blob file in cache directory");
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if !stem.is_empty() => {
                    ids.insert(stem.to_string());
                }
                _ => {
                    warn!(path = %path.display(), "cache entry has an unparseable name, skipping");
                }
            }
        }
        Ok(ids)
    }

    pub async fn delete(&self, id: &str) -> Result<(), CacheError> {
        let path = self.blob_path(id);
        fs::remove_file(&path)
            .await
            .map_err(|e| CacheError::io(&path, e))
    }
}
