//! Storage backend for the static game bundle.
//!
//! The file responder only needs existence checks, opening, a size, and a byte stream;
//! no write operations. [`DirectoryStorage`] serves a host directory.

mod directory;

pub use directory::DirectoryStorage;

use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// An opened file: its size and a stream over its bytes.
pub struct StoredFile {
    size: u64,
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl StoredFile {
    pub fn new(size: u64, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            size,
            reader: Box::pin(reader),
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn into_reader(self) -> Pin<Box<dyn AsyncRead + Send>> {
        self.reader
    }
}

impl std::fmt::Debug for StoredFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredFile").field("size", &self.size).finish()
    }
}

/// Read-only storage the HTTP server resolves request paths against.
/// Paths are request paths as received (leading `/`, already normalized by the caller).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// False when the medium is absent; every lookup is then reported as unavailable.
    fn is_mounted(&self) -> bool;

    async fn exists(&self, path: &str) -> bool;

    async fn open(&self, path: &str) -> std::io::Result<StoredFile>;
}
