//! Persistent download cache with atomic flushes
//!
//! The cache maps an episode's normalized address to the Unix time (in
//! milliseconds) of its successful download. It is written after every
//! success so an interrupted run never re-downloads finished episodes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, error, info, warn};
use url::Url;

use super::with_suffix;
use crate::constants::files;
use crate::errors::{CacheError, CacheResult};

/// Completed downloads, keyed by episode address
#[derive(Debug)]
pub struct DownloadCache {
    path: PathBuf,
    entries: BTreeMap<String, i64>,
    flushes: usize,
}

impl DownloadCache {
    /// Cache stored at `path` with no entries
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            flushes: 0,
        }
    }

    /// Cache file inside an output directory
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(files::CACHE_FILE_NAME)
    }

    /// Load the cache, copying the current file to its backup first
    ///
    /// An absent or corrupt file yields an empty cache. With `ignore_existing`
    /// the backup is still taken but previous entries are not consulted.
    pub async fn open(path: impl Into<PathBuf>, ignore_existing: bool) -> CacheResult<Self> {
        let path = path.into();
        let mut cache = Self::empty(path.clone());

        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file at {}", path.display());
                return Ok(cache);
            }
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let backup = with_suffix(&path, files::BACKUP_FILE_SUFFIX);
        fs::write(&backup, &content)
            .await
            .map_err(|source| CacheError::Io {
                path: backup.clone(),
                source,
            })?;

        if ignore_existing {
            info!("Ignoring {} existing cache entries", path.display());
            return Ok(cache);
        }

        // Invalid UTF-8 surfaces here as a JSON error too
        match serde_json::from_slice::<BTreeMap<String, i64>>(&content) {
            Ok(entries) => {
                debug!("Loaded {} cache entries from {}", entries.len(), path.display());
                cache.entries = entries;
            }
            Err(e) => {
                warn!(
                    "Cache file {} is corrupted ({}), starting from an empty cache. A copy was kept at {}",
                    path.display(),
                    e,
                    backup.display()
                );
            }
        }

        Ok(cache)
    }

    /// Cache key for an address
    pub fn key(address: &Url) -> String {
        let mut normalized = address.clone();
        normalized.set_fragment(None);
        normalized.to_string()
    }

    pub fn is_downloaded(&self, address: &Url) -> bool {
        self.entries.contains_key(&Self::key(address))
    }

    /// Record a completed download; call [`flush`](Self::flush) to persist it
    pub fn mark_downloaded(&mut self, address: &Url, timestamp_ms: i64) {
        self.entries.insert(Self::key(address), timestamp_ms);
    }

    /// Timestamp recorded for an address
    pub fn downloaded_at(&self, address: &Url) -> Option<i64> {
        self.entries.get(&Self::key(address)).copied()
    }

    /// Write the whole map to disk atomically
    pub async fn flush(&mut self) -> CacheResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| CacheError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let content = serde_json::to_string_pretty(&self.entries)?;
        let temp_path = with_suffix(&self.path, files::TEMP_FILE_SUFFIX);

        fs::write(&temp_path, content)
            .await
            .map_err(|source| CacheError::Io {
                path: temp_path.clone(),
                source,
            })?;

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            error!("Failed to rename temporary cache file: {}", e);
            CacheError::AtomicOperationFailed {
                temp_path: temp_path.clone(),
                final_path: self.path.clone(),
            }
        })?;

        self.flushes += 1;
        debug!("Flushed {} cache entries", self.entries.len());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of successful flushes since the cache was opened
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}
