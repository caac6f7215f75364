//! Document managers: the per-asset-type collaborators that know how to parse,
//! enumerate and transform a kind of asset file.

use crate::error::{ErrorKind, Result};
use crate::guid::Guid;
use async_trait::async_trait;
use quarry_storage::{BackendHandle, ProjectPath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentFlags {
    pub supports_thumbnail: bool,
    /// Hash-only type: `UpToDate` as soon as it is hashed, never processed.
    pub disable_transform: bool,
    /// Processed before every other asset during initialization.
    pub core: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTypeDescriptor {
    pub name: String,
    /// Lower-case file extension without the leading dot.
    pub extension: String,
    pub flags: DocumentFlags,
}

impl DocumentTypeDescriptor {
    pub fn new(name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extension: extension.into().trim_start_matches('.').to_ascii_lowercase(),
            flags: DocumentFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: DocumentFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Display data for one sub-asset, supplied by the document manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAssetData {
    pub guid: Guid,
    pub name: String,
    pub asset_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Everything the curator needs to know about a parsed asset file.
///
/// Dependencies are either asset GUIDs or paths. Paths that don't start with
/// a data directory name are relative to the asset's own data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDocumentInfo {
    pub guid: Guid,
    pub asset_type: String,
    #[serde(default)]
    pub transform_dependencies: BTreeSet<String>,
    #[serde(default)]
    pub thumbnail_dependencies: BTreeSet<String>,
    /// Only used for transitive hull queries; never affects hashes.
    #[serde(default)]
    pub package_dependencies: BTreeSet<String>,
    /// Hash of the asset's own import/transform settings.
    #[serde(default)]
    pub settings_hash: u64,
    #[serde(default)]
    pub needs_import: bool,
    #[serde(default)]
    pub sub_assets: Vec<SubAssetData>,
}

impl AssetDocumentInfo {
    pub fn new(guid: Guid, asset_type: impl Into<String>) -> Self {
        Self {
            guid,
            asset_type: asset_type.into(),
            transform_dependencies: BTreeSet::new(),
            thumbnail_dependencies: BTreeSet::new(),
            package_dependencies: BTreeSet::new(),
            settings_hash: 0,
            needs_import: false,
            sub_assets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformFlags {
    /// Transform even if the ledger says the output is current.
    pub force: bool,
    pub triggered_manually: bool,
    pub background: bool,
}

impl TransformFlags {
    pub fn forced() -> Self {
        Self { force: true, ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformResult {
    Success,
    Failure,
    NeedsImport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformStatus {
    pub result: TransformResult,
    pub message: Option<String>,
}

impl TransformStatus {
    pub fn success() -> Self {
        Self { result: TransformResult::Success, message: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { result: TransformResult::Failure, message: Some(message.into()) }
    }

    pub fn needs_import() -> Self {
        Self { result: TransformResult::NeedsImport, message: None }
    }

    pub fn is_success(&self) -> bool {
        self.result == TransformResult::Success
    }
}

impl fmt::Display for TransformStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.result, &self.message) {
            (TransformResult::Success, _) => f.write_str("success"),
            (TransformResult::NeedsImport, _) => f.write_str("needs import"),
            (TransformResult::Failure, Some(message)) => write!(f, "failure: {message}"),
            (TransformResult::Failure, None) => f.write_str("failure"),
        }
    }
}

/// Input handed to [`DocumentManager::process`] and
/// [`DocumentManager::create_thumbnail`].
#[derive(Clone)]
pub struct TransformRequest {
    pub guid: Guid,
    pub path: ProjectPath,
    pub document: Arc<AssetDocumentInfo>,
    pub profile: String,
    pub asset_hash: u64,
    pub thumb_hash: u64,
    pub flags: TransformFlags,
    /// Backend of the data directory the asset lives in.
    pub backend: BackendHandle,
}

#[async_trait]
pub trait DocumentManager: Send + Sync {
    fn descriptors(&self) -> Vec<DocumentTypeDescriptor>;

    /// Returns [`ErrorKind::InvalidDocument`] if `bytes` isn't a valid document.
    fn parse_document(&self, path: &ProjectPath, bytes: &[u8]) -> Result<AssetDocumentInfo>;

    /// Sub-assets besides the main one. The main sub-asset is created by the
    /// curator and must not be part of the result.
    fn sub_assets(&self, _path: &ProjectPath, info: &AssetDocumentInfo) -> Vec<SubAssetData> {
        info.sub_assets.clone()
    }

    async fn process(&self, request: &TransformRequest) -> TransformStatus;

    async fn create_thumbnail(&self, _request: &TransformRequest) -> TransformStatus {
        TransformStatus::success()
    }
}

type ManagerHandle = Arc<dyn DocumentManager>;

/// Document managers keyed by the extension of the files they handle.
#[derive(Clone, Default)]
pub struct DocumentManagerRegistry {
    by_extension: HashMap<String, (Arc<DocumentTypeDescriptor>, ManagerHandle)>,
}

impl DocumentManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every document type `manager` declares.
    ///
    /// Fails without registering anything if one of its extensions is
    /// already taken.
    pub fn register(&mut self, manager: ManagerHandle) -> Result<()> {
        let types = manager.descriptors();
        for descriptor in &types {
            if self.by_extension.contains_key(&descriptor.extension) {
                exn::bail!(ErrorKind::DuplicateExtension(descriptor.extension.clone()));
            }
        }
        for descriptor in types {
            tracing::debug!(name = %descriptor.name, extension = %descriptor.extension, "registered document type");
            self.by_extension.insert(descriptor.extension.clone(), (Arc::new(descriptor), manager.clone()));
        }
        Ok(())
    }

    pub fn with(mut self, manager: ManagerHandle) -> Result<Self> {
        self.register(manager)?;
        Ok(self)
    }

    pub fn for_path(&self, path: &ProjectPath) -> Option<(&Arc<DocumentTypeDescriptor>, &ManagerHandle)> {
        let extension = path.extension()?;
        self.by_extension.get(&extension).map(|(descriptor, manager)| (descriptor, manager))
    }

    pub fn is_asset_path(&self, path: &ProjectPath) -> bool {
        self.for_path(path).is_some()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &DocumentTypeDescriptor> {
        self.by_extension.values().map(|(descriptor, _)| descriptor.as_ref())
    }
}

impl fmt::Debug for DocumentManagerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.by_extension.keys()).finish()
    }
}
