//! The background update worker.
//!
//! One task drains the stale set: it picks the next stale asset, re-reads its
//! document if the file changed, hashes it and goes on to the next one. When
//! nothing is stale it sleeps until a change notification wakes it up.

use crate::curator::Inner;
use crate::guid::Guid;
use quarry_storage::{FileInfo, ProjectPath};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) struct UpdateTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl UpdateTask {
    pub(crate) fn spawn(inner: Arc<Inner>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tracing::debug!("update task started");
            while !token.is_cancelled() {
                if inner.run_next_update_task().await {
                    continue;
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = inner.wake.notified() => {},
                }
            }
            tracing::debug!("update task stopped");
        });
        Self { cancel, handle }
    }

    /// Stop after the unit of work in flight (if any) has finished.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "update task ended abnormally");
        }
    }
}

enum Refresh {
    Unchanged,
    Parsed(FileInfo),
    Removed,
}

impl Inner {
    /// Process one stale asset. Returns `false` if there was nothing to do.
    pub(crate) async fn run_next_update_task(&self) -> bool {
        let Some((guid, path)) = self.catalog().next_asset_to_update() else {
            return false;
        };
        self.ensure_asset_info_updated(guid, &path).await;
        let state = self.update_asset_transform_state(guid, false, &mut Vec::new()).await;
        tracing::trace!(%guid, %path, ?state, "update task finished");
        self.catalog().on_update_task_finished(guid);
        true
    }

    async fn refresh_needed(&self, guid: Guid, path: &ProjectPath) -> Refresh {
        let removed = self.catalog().registry.get(&guid).is_some_and(|info| !info.existence.exists());
        let Ok(backend) = self.backend(path) else {
            return Refresh::Removed;
        };
        match backend.stat(path.relative()).await {
            Ok(info) if !removed && self.file_status.cached_document(path, &info).is_some() => Refresh::Unchanged,
            Ok(info) => Refresh::Parsed(info),
            Err(e) if e.is_not_found() => Refresh::Removed,
            Err(e) => {
                tracing::warn!(%path, error = ?e, "could not stat asset file");
                Refresh::Unchanged
            },
        }
    }

    /// Make sure the registry reflects the current contents of the asset
    /// file: re-parse it if it changed and purge the asset if it is gone.
    pub(crate) async fn ensure_asset_info_updated(&self, guid: Guid, path: &ProjectPath) {
        let info = match self.refresh_needed(guid, path).await {
            Refresh::Unchanged => return,
            Refresh::Parsed(info) => info,
            Refresh::Removed => {
                let mut catalog = self.catalog();
                if catalog.registry.get(&guid).is_some_and(|asset| &asset.path == path) {
                    catalog.remove_asset(guid);
                }
                self.file_status.remove(path);
                return;
            },
        };
        self.file_status.observe(path, &info);
        match self.load_document(path, &info).await {
            Ok(loaded) => {
                self.catalog().register_document(path.clone(), loaded.descriptor, loaded.document, loaded.sub_assets);
            },
            Err(e) => {
                tracing::warn!(%guid, %path, error = ?e, "could not parse asset");
                let mut catalog = self.catalog();
                catalog.record_failure(guid, (*e).to_string());
            },
        }
    }
}
