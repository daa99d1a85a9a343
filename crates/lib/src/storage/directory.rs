//! Directory-backed storage: a host directory stands in for the removable card.

use super::{StorageBackend, StoredFile};
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Serves files below `root`. Mount state is decided once, when the storage is mounted.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
    mounted: bool,
}

impl DirectoryStorage {
    /// Mount `root`. When it is not an existing directory the storage is unmounted and
    /// stays that way for the life of the process.
    pub fn mount(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mounted = root.is_dir();
        if mounted {
            log::info!("storage mounted at {}", root.display());
        } else {
            log::warn!("storage root {} is not a directory; serving 503", root.display());
        }
        Self { root, mounted }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto the root. `None` for paths with `..` or other non-plain
    /// segments, which are then reported as absent.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut out = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(out)
    }
}

#[async_trait]
impl StorageBackend for DirectoryStorage {
    fn is_mounted(&self) -> bool {
        self.mounted
    }

    async fn exists(&self, path: &str) -> bool {
        if !self.mounted {
            return false;
        }
        match self.resolve(path) {
            Some(p) => tokio::fs::metadata(&p).await.is_ok(),
            None => false,
        }
    }

    async fn open(&self, path: &str) -> io::Result<StoredFile> {
        if !self.mounted {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "storage not mounted"));
        }
        let full = self
            .resolve(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path escapes storage root"))?;
        let file = tokio::fs::File::open(&full).await?;
        let meta = file.metadata().await?;
        if meta.is_dir() {
            return Err(io::Error::other("is a directory"));
        }
        Ok(StoredFile::new(meta.len(), file))
    }
}
