//! A permanent key/blob store backed by a directory.

use crate::Result;
use bytes::Bytes;
use ohno::IntoAppError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const LOG_TARGET: &str = "     cache";

/// Turn a locator into a filesystem-safe cache key.
///
/// The scheme is dropped and the characters that are reserved in paths or query strings are
/// replaced, so `http://www.example.com/cards?page=2` becomes `www-example-com-cardsqpagee2`.
#[must_use]
pub fn cache_key(locator: &str) -> String {
    let trimmed = locator
        .strip_prefix("http://")
        .or_else(|| locator.strip_prefix("https://"))
        .unwrap_or(locator);

    trimmed
        .chars()
        .map(|c| match c {
            '.' | '/' => '-',
            '?' => 'q',
            '&' => 'a',
            '=' => 'e',
            other => other,
        })
        .collect()
}

/// Storage boundary for cached page content.
pub trait CacheStore: Send + Sync {
    /// Whether an entry exists for the key.
    fn exists(&self, key: &str) -> bool;

    /// Read the full entry stored under the key.
    fn read(&self, key: &str) -> Result<Bytes>;

    /// Store the entry, making it visible under the key only once it is complete.
    fn write(&self, key: &str, content: &[u8]) -> Result<()>;
}

/// A [`CacheStore`] keeping one file per key in a single directory.
#[derive(Debug, Clone)]
pub struct DirCache {
    dir: PathBuf,
}

impl DirCache {
    /// Open (and create if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).into_app_err_with(|| format!("unable to create cache directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl CacheStore for DirCache {
    fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    fn read(&self, key: &str) -> Result<Bytes> {
        let path = self.path_for(key);
        let data = fs::read(&path).into_app_err_with(|| format!("unable to read cache entry '{}'", path.display()))?;
        log::debug!(target: LOG_TARGET, "Cache hit for {key}");
        Ok(Bytes::from(data))
    }

    fn write(&self, key: &str, content: &[u8]) -> Result<()> {
        let path = self.path_for(key);

        // Stage in the same directory so the final rename stays on one filesystem.
        let mut staged =
            NamedTempFile::new_in(&self.dir).into_app_err_with(|| format!("unable to stage cache entry in '{}'", self.dir.display()))?;
        staged
            .write_all(content)
            .into_app_err_with(|| format!("unable to write cache entry '{}'", path.display()))?;
        staged
            .flush()
            .into_app_err_with(|| format!("unable to flush cache entry '{}'", path.display()))?;
        let _ = staged
            .persist(&path)
            .into_app_err_with(|| format!("unable to publish cache entry '{}'", path.display()))?;

        log::debug!(target: LOG_TARGET, "Cached {} bytes for {key}", content.len());
        Ok(())
    }
}
