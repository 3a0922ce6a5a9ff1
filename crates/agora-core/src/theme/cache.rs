//! Process-wide read-through cache of parsed theme documents.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ThemeError;
use crate::theme::document::ThemeDocument;

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThemeCacheStats {
    /// Requests served from memory.
    pub hits: u64,
    /// Documents read and parsed from disk.
    pub loads: u64,
    /// Documents currently cached.
    pub entries: usize,
}

/// Theme documents keyed by file name.
///
/// Entries are immutable once inserted. Two requests missing on the same file
/// at the same time may both parse it; the later insert wins. In bypass mode
/// nothing is stored and every call re-reads the file.
#[derive(Debug)]
pub struct ThemeCache {
    directory: PathBuf,
    bypass: bool,
    documents: RwLock<HashMap<String, Arc<ThemeDocument>>>,
    hits: AtomicU64,
    loads: AtomicU64,
}

impl ThemeCache {
    /// Caching instance for theme files under `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_bypass(directory, false)
    }

    /// Instance that never stores documents when `bypass` is set.
    #[must_use]
    pub fn with_bypass(directory: impl Into<PathBuf>, bypass: bool) -> Self {
        Self {
            directory: directory.into(),
            bypass,
            documents: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    /// Directory holding the theme files.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Whether documents are re-read on every call.
    #[must_use]
    pub const fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Cached document for `file`, loading and storing it on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Read`] when the file cannot be read and the
    /// parse errors of [`ThemeDocument::parse`].
    pub async fn get_or_load(&self, file: &str) -> Result<Arc<ThemeDocument>, ThemeError> {
        if !self.bypass
            && let Some(document) = self.cached(file)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(document);
        }

        let document = Arc::new(self.load(file).await?);
        if !self.bypass {
            self.documents
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(file.to_string(), Arc::clone(&document));
        }
        Ok(document)
    }

    /// Drop the cached copy of `file`. Returns whether an entry was removed.
    pub fn invalidate(&self, file: &str) -> bool {
        let removed = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(file)
            .is_some();
        if removed {
            info!(file, "theme document invalidated");
        }
        removed
    }

    /// Drop every cached document.
    pub fn clear(&self) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> ThemeCacheStats {
        ThemeCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            entries: self
                .documents
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }

    fn cached(&self, file: &str) -> Option<Arc<ThemeDocument>> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(file)
            .cloned()
    }

    async fn load(&self, file: &str) -> Result<ThemeDocument, ThemeError> {
        let path = self.directory.join(file);
        let xml = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ThemeError::Read {
                path: path.clone(),
                source,
            })?;
        let document = ThemeDocument::parse(file, &xml)?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        debug!(
            file,
            dir = document.dir(),
            resources = document.resources().len(),
            bypass = self.bypass,
            "theme document loaded"
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_theme(dir: &TempDir, file: &str, asset_dir: &str) {
        let xml = format!(
            r#"<Theme dir="{asset_dir}"><page name="P"><Resource tag="T">v</Resource></page></Theme>"#
        );
        fs::write(dir.path().join(file), xml).expect("write theme");
    }

    #[tokio::test]
    async fn parses_each_file_once() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        write_theme(&dir, "a.xml", "alpha");
        let cache = ThemeCache::new(dir.path());

        let first = cache.get_or_load("a.xml").await?;
        let second = cache.get_or_load("a.xml").await?;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            ThemeCacheStats {
                hits: 1,
                loads: 1,
                entries: 1
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn bypass_reparses_every_call() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        write_theme(&dir, "a.xml", "alpha");
        let cache = ThemeCache::with_bypass(dir.path(), true);

        assert_eq!(cache.get_or_load("a.xml").await?.dir(), "alpha");
        write_theme(&dir, "a.xml", "beta");
        assert_eq!(cache.get_or_load("a.xml").await?.dir(), "beta");

        let stats = cache.stats();
        assert_eq!(stats.loads, 2);
        assert_eq!(stats.entries, 0);
        Ok(())
    }

    #[tokio::test]
    async fn invalidate_forces_reload() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        write_theme(&dir, "a.xml", "alpha");
        let cache = ThemeCache::new(dir.path());

        cache.get_or_load("a.xml").await?;
        write_theme(&dir, "a.xml", "beta");
        assert_eq!(cache.get_or_load("a.xml").await?.dir(), "alpha");

        assert!(cache.invalidate("a.xml"));
        assert!(!cache.invalidate("a.xml"));
        assert_eq!(cache.get_or_load("a.xml").await?.dir(), "beta");
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = TempDir::new().expect("tempdir");
        let cache = ThemeCache::new(dir.path());
        let err = cache
            .get_or_load("absent.xml")
            .await
            .expect_err("file does not exist");
        assert!(matches!(err, ThemeError::Read { .. }));
        assert_eq!(cache.stats().entries, 0);
    }
}
