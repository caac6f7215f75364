#![allow(dead_code)]

use async_trait::async_trait;
use exn::ResultExt;
use quarry_curator::error::{ErrorKind, Result};
use quarry_curator::{
    AssetDocumentInfo, Curator, CuratorOptions, DocumentFlags, DocumentManager, DocumentManagerRegistry,
    DocumentTypeDescriptor, Guid, TransformRequest, TransformStatus,
};
use quarry_storage::backend::{MockBackend, StorageBackend};
use quarry_storage::{BackendHandle, ProjectPath};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Asset type whose transform always fails.
pub const BROKEN: &str = "Broken";

/// JSON-serialized [`AssetDocumentInfo`] files with the `.qasset` extension,
/// plus `.qthumb` files that also get thumbnails.
#[derive(Default)]
pub struct TestAssets {
    processed: Mutex<Vec<(Guid, String, u64)>>,
    thumbnails: Mutex<Vec<Guid>>,
}

impl TestAssets {
    pub fn processed(&self) -> Vec<(Guid, String, u64)> {
        self.processed.lock().unwrap().clone()
    }

    pub fn processed_guids(&self) -> Vec<Guid> {
        self.processed().into_iter().map(|(guid, _, _)| guid).collect()
    }

    pub fn thumbnails(&self) -> Vec<Guid> {
        self.thumbnails.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentManager for TestAssets {
    fn descriptors(&self) -> Vec<DocumentTypeDescriptor> {
        let thumbnails = DocumentFlags { supports_thumbnail: true, ..DocumentFlags::default() };
        vec![
            DocumentTypeDescriptor::new("Test Asset", "qasset"),
            DocumentTypeDescriptor::new("Previewed Asset", "qthumb").with_flags(thumbnails),
        ]
    }

    fn parse_document(&self, path: &ProjectPath, bytes: &[u8]) -> Result<AssetDocumentInfo> {
        serde_json::from_slice(bytes).or_raise(|| ErrorKind::InvalidDocument(path.to_string()))
    }

    async fn process(&self, request: &TransformRequest) -> TransformStatus {
        if request.document.asset_type == BROKEN {
            return TransformStatus::failure("this asset never transforms");
        }
        self.processed.lock().unwrap().push((request.guid, request.profile.clone(), request.asset_hash));
        TransformStatus::success()
    }

    async fn create_thumbnail(&self, request: &TransformRequest) -> TransformStatus {
        self.thumbnails.lock().unwrap().push(request.guid);
        TransformStatus::success()
    }
}

pub fn guid(n: u128) -> Guid {
    Guid::from_u128(n)
}

pub fn path(value: &str) -> ProjectPath {
    ProjectPath::parse(value).unwrap()
}

/// Bytes of an asset file.
pub fn asset(guid: Guid, settings_hash: u64, transform_dependencies: &[&str]) -> Vec<u8> {
    let mut document = AssetDocumentInfo::new(guid, "Material");
    document.settings_hash = settings_hash;
    document.transform_dependencies = transform_dependencies.iter().map(|s| s.to_string()).collect();
    serde_json::to_vec(&document).unwrap()
}

pub fn with_type(bytes: Vec<u8>, asset_type: &str) -> Vec<u8> {
    let mut document: AssetDocumentInfo = serde_json::from_slice(&bytes).unwrap();
    document.asset_type = asset_type.to_string();
    serde_json::to_vec(&document).unwrap()
}

pub struct Project {
    pub backend: Arc<MockBackend>,
    pub manager: Arc<TestAssets>,
    pub curator: Curator,
}

impl Project {
    /// One data directory named `Base`, no background worker, no cache.
    pub async fn new<'a>(files: impl IntoIterator<Item = (&'a str, Vec<u8>)>) -> Self {
        Self::with_options(files, CuratorOptions { background_updates: false, ..CuratorOptions::default() }).await
    }

    pub async fn with_options<'a>(files: impl IntoIterator<Item = (&'a str, Vec<u8>)>, options: CuratorOptions) -> Self {
        let backend = Arc::new(MockBackend::with_files(files).with_name("Base"));
        let manager = Arc::new(TestAssets::default());
        let managers = DocumentManagerRegistry::new().with(manager.clone()).unwrap();
        let handle: BackendHandle = backend.clone();
        let curator = Curator::new(options, [handle], managers).unwrap();
        curator.initialize().await.unwrap();
        Self { backend, manager, curator }
    }

    pub async fn write(&self, relative: &str, bytes: &[u8]) {
        self.put(relative, bytes).await;
        self.notify(relative).await;
    }

    pub async fn delete(&self, relative: &str) {
        self.remove(relative).await;
        self.notify(relative).await;
    }

    /// Write to the backend without telling the curator.
    pub async fn put(&self, relative: &str, bytes: &[u8]) {
        self.backend.write(Path::new(relative), bytes).await.unwrap();
    }

    /// Delete from the backend without telling the curator.
    pub async fn remove(&self, relative: &str) {
        self.backend.delete(Path::new(relative)).await.unwrap();
    }

    pub async fn notify(&self, relative: &str) {
        self.curator.notify_of_file_change(&path(&format!("Base/{relative}"))).await.unwrap();
    }

    /// Hash everything that is stale.
    pub async fn settle(&self) {
        self.curator.process_pending_updates().await;
    }

    /// `(asset_hash, thumb_hash, state)` of `guid`.
    pub fn snapshot(&self, guid: Guid) -> (u64, u64, quarry_curator::TransformState) {
        let lock = self.curator.lock();
        let info = lock.asset_info(guid).unwrap();
        (info.asset_hash, info.thumb_hash, info.transform_state)
    }

    pub fn state(&self, guid: Guid) -> quarry_curator::TransformState {
        self.snapshot(guid).2
    }
}
