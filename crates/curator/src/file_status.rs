//! Last observed size, modification time and content hash of every file.
//!
//! Guarded by its own mutex so persisting it never contends with the
//! curator lock. Also remembers parsed asset documents, keyed by the file
//! status they were parsed from.

use crate::document::AssetDocumentInfo;
use quarry_cache::{DocumentRecord, FileRecord};
use quarry_storage::error::Result as StorageResult;
use quarry_storage::{BackendHandle, FileInfo, ProjectPath};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::UtcDateTime;

/// Hash file contents down to the 64 bits the curator combines.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u64 {
    let hash = blake3::hash(bytes);
    let mut truncated = [0u8; 8];
    truncated.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(truncated)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileStatus {
    pub(crate) size: u64,
    pub(crate) modified: UtcDateTime,
    /// `None` until hashed, and again whenever size or mtime change.
    pub(crate) hash: Option<u64>,
}

impl FileStatus {
    fn matches(&self, info: &FileInfo) -> bool {
        self.size == info.size && self.modified == info.modified
    }
}

#[derive(Debug, Clone)]
struct CachedDocument {
    size: u64,
    modified: UtcDateTime,
    document: Arc<AssetDocumentInfo>,
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<ProjectPath, FileStatus>,
    documents: HashMap<ProjectPath, CachedDocument>,
}

#[derive(Debug, Default)]
pub(crate) struct FileStatusCache {
    state: Mutex<State>,
}

impl FileStatusCache {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn status(&self, path: &ProjectPath) -> Option<FileStatus> {
        self.state().files.get(path).copied()
    }

    /// Record freshly observed metadata. Returns `true` if the file is new or
    /// differs from what was last seen.
    pub(crate) fn observe(&self, path: &ProjectPath, info: &FileInfo) -> bool {
        let mut state = self.state();
        match state.files.get_mut(path) {
            Some(status) if status.matches(info) => false,
            Some(status) => {
                *status = FileStatus { size: info.size, modified: info.modified, hash: None };
                true
            },
            None => {
                state.files.insert(path.clone(), FileStatus { size: info.size, modified: info.modified, hash: None });
                true
            },
        }
    }

    pub(crate) fn remove(&self, path: &ProjectPath) {
        let mut state = self.state();
        state.files.remove(path);
        state.documents.remove(path);
    }

    /// Every observed path for which `select` returns `true`.
    pub(crate) fn paths_where(&self, select: impl Fn(&ProjectPath) -> bool) -> Vec<ProjectPath> {
        self.state().files.keys().filter(|path| select(path)).cloned().collect()
    }

    /// Drop every entry for which `keep` returns `false`.
    pub(crate) fn retain(&self, keep: impl Fn(&ProjectPath) -> bool) {
        let mut state = self.state();
        state.files.retain(|path, _| keep(path));
        state.documents.retain(|path, _| keep(path));
    }

    fn cached_hash(&self, path: &ProjectPath, info: &FileInfo) -> Option<u64> {
        self.state().files.get(path).filter(|status| status.matches(info)).and_then(|status| status.hash)
    }

    /// Content hash of the file at `path`.
    ///
    /// Unless `force` is set, a file whose size and modification time still
    /// match the last observation is not read again.
    pub(crate) async fn hash_file(&self, backend: &BackendHandle, path: &ProjectPath, force: bool) -> StorageResult<u64> {
        let info = backend.stat(path.relative()).await?;
        if !force && let Some(hash) = self.cached_hash(path, &info) {
            return Ok(hash);
        }
        let bytes = backend.read(path.relative()).await?;
        let hash = hash_bytes(&bytes);
        tracing::trace!(%path, hash, "hashed file contents");
        let status = FileStatus { size: info.size, modified: info.modified, hash: Some(hash) };
        self.state().files.insert(path.clone(), status);
        Ok(hash)
    }

    /// A previously parsed document, if the file hasn't changed since.
    pub(crate) fn cached_document(&self, path: &ProjectPath, info: &FileInfo) -> Option<Arc<AssetDocumentInfo>> {
        self.state()
            .documents
            .get(path)
            .filter(|cached| cached.size == info.size && cached.modified == info.modified)
            .map(|cached| cached.document.clone())
    }

    pub(crate) fn store_document(&self, path: &ProjectPath, info: &FileInfo, document: Arc<AssetDocumentInfo>) {
        let cached = CachedDocument { size: info.size, modified: info.modified, document };
        self.state().documents.insert(path.clone(), cached);
    }

    /// Seed from the persisted cache. Unusable rows are skipped.
    pub(crate) fn load(&self, files: Vec<FileRecord>, documents: Vec<DocumentRecord>) {
        let mut state = self.state();
        for record in files {
            let Ok(path) = ProjectPath::parse(&record.path) else {
                continue;
            };
            let status = FileStatus { size: record.size, modified: record.modified, hash: record.hash };
            state.files.insert(path, status);
        }
        for record in documents {
            let Ok(path) = ProjectPath::parse(&record.path) else {
                continue;
            };
            match serde_json::from_str::<AssetDocumentInfo>(&record.document) {
                Ok(document) => {
                    let cached = CachedDocument { size: record.size, modified: record.modified, document: Arc::new(document) };
                    state.documents.insert(path, cached);
                },
                Err(e) => tracing::debug!(%path, error = %e, "skipping unreadable cached document"),
            }
        }
    }

    pub(crate) fn to_records(&self) -> (Vec<FileRecord>, Vec<DocumentRecord>) {
        let state = self.state();
        let mut files: Vec<_> = state
            .files
            .iter()
            .map(|(path, status)| FileRecord {
                path: path.to_string(),
                size: status.size,
                modified: status.modified,
                hash: status.hash,
            })
            .collect();
        let mut documents = Vec::with_capacity(state.documents.len());
        for (path, cached) in &state.documents {
            match serde_json::to_string(cached.document.as_ref()) {
                Ok(document) => documents.push(DocumentRecord {
                    path: path.to_string(),
                    size: cached.size,
                    modified: cached.modified,
                    document,
                }),
                Err(e) => tracing::warn!(%path, error = %e, "could not serialize asset document"),
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        documents.sort_by(|a, b| a.path.cmp(&b.path));
        (files, documents)
    }
}
