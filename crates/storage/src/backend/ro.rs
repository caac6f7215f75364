//! Read-only storage backend.
//!
//! Wraps another backend and drops write operations while still reporting
//! success, so a dry run can execute transforms without touching disk.

use async_trait::async_trait;
use std::path::Path;

use crate::{BackendHandle, StorageBackend, backend::FileInfoStream, error::Result, file::FileInfo};

/// Read-only storage backend.
///
/// Wraps another backend and silently drops all write operations, logging an
/// [`info event`](tracing::Event).
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::info!(directory = self.inner.name(), path = %path.display(), bytes = data.len(), "Skipping write during read-only mode");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tracing::info!(directory = self.inner.name(), path = %path.display(), "Skipping delete during read-only mode");
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_writes_are_dropped() {
        let inner: BackendHandle = Arc::new(MockBackend::with_files([("kept.txt", b"data".to_vec())]));
        let backend = ReadOnlyBackend::new(inner.clone());
        backend.write(Path::new("new.txt"), b"data").await.unwrap();
        backend.delete(Path::new("kept.txt")).await.unwrap();
        assert!(!inner.exists(Path::new("new.txt")).await.unwrap());
        assert!(inner.exists(Path::new("kept.txt")).await.unwrap());
        assert_eq!(backend.read(Path::new("kept.txt")).await.unwrap(), b"data");
    }
}
