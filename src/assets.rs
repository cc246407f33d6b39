//! Bundled asset extraction
//!
//! Renderers open documents from the local filesystem, so bundled files are
//! copied into cache storage on first use.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Directory of files shipped with the application
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_name(name: &str) -> Result<()> {
        let mut components = Path::new(name).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(std::path::Component::Normal(_)), None)
        );
        if !plain {
            return Err(Error::InvalidAssetName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Copy asset `name` to `cache_dir/name` and return the destination.
    ///
    /// Nothing is copied when the destination already exists. The copy goes
    /// through a uniquely named temporary file so an interrupted copy is never
    /// mistaken for a finished one.
    pub fn extract<P: AsRef<Path>>(&self, name: &str, cache_dir: P) -> Result<PathBuf> {
        Self::validate_name(name)?;
        let destination = cache_dir.as_ref().join(name);
        if destination.exists() {
            tracing::debug!(path = %destination.display(), "Asset already extracted");
            return Ok(destination);
        }

        let source = self.root.join(name);
        if !source.is_file() {
            return Err(Error::AssetNotFound {
                name: name.to_string(),
            });
        }

        std::fs::create_dir_all(cache_dir.as_ref())?;
        let mut partial = tempfile::Builder::new()
            .prefix(&format!("{}.", name))
            .suffix(".part")
            .tempfile_in(cache_dir.as_ref())?;
        let bytes = std::io::copy(&mut std::fs::File::open(&source)?, partial.as_file_mut())?;

        // Concurrent extractions each copy into their own temp file; the
        // first to land wins and the others drop theirs.
        if let Err(e) = partial.persist_noclobber(&destination) {
            if destination.exists() {
                tracing::debug!(path = %destination.display(), "Asset extracted concurrently");
                return Ok(destination);
            }
            return Err(Error::Io(e.error));
        }

        tracing::info!(asset = name, bytes, path = %destination.display(), "Extracted asset");
        Ok(destination)
    }

    /// [`AssetStore::extract`] on the blocking thread pool
    pub async fn extract_async(&self, name: &str, cache_dir: PathBuf) -> Result<PathBuf> {
        let store = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || store.extract(&name, cache_dir))
            .await
            .map_err(|e| Error::Runtime {
                reason: format!("Task join error: {}", e),
            })?
    }
}
