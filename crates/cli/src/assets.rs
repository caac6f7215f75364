//! Document types understood by the command-line tool.
//!
//! Both are JSON serializations of [`AssetDocumentInfo`]. Transforming an
//! asset writes its resolved document to
//! `AssetCache/<profile>/<guid>.json` inside the asset's data directory.

use async_trait::async_trait;
use exn::ResultExt;
use quarry_curator::error::{ErrorKind, Result};
use quarry_curator::{
    AssetDocumentInfo, DocumentFlags, DocumentManager, DocumentTypeDescriptor, TransformRequest, TransformStatus,
};
use quarry_storage::ProjectPath;
use serde::Serialize;
use std::path::PathBuf;

pub const OUTPUT_DIRECTORY: &str = "AssetCache";

#[derive(Serialize)]
struct Output<'a> {
    guid: String,
    source: String,
    profile: &'a str,
    asset_hash: String,
    document: &'a AssetDocumentInfo,
}

pub struct JsonAssets;

pub fn output_path(request: &TransformRequest) -> PathBuf {
    PathBuf::from(OUTPUT_DIRECTORY).join(&request.profile).join(format!("{}.json", request.guid))
}

#[async_trait]
impl DocumentManager for JsonAssets {
    fn descriptors(&self) -> Vec<DocumentTypeDescriptor> {
        let collection = DocumentFlags { disable_transform: true, core: true, ..DocumentFlags::default() };
        vec![
            DocumentTypeDescriptor::new("Asset", "qasset"),
            DocumentTypeDescriptor::new("Collection", "qcollection").with_flags(collection),
        ]
    }

    fn parse_document(&self, path: &ProjectPath, bytes: &[u8]) -> Result<AssetDocumentInfo> {
        serde_json::from_slice(bytes).or_raise(|| ErrorKind::InvalidDocument(path.to_string()))
    }

    async fn process(&self, request: &TransformRequest) -> TransformStatus {
        let output = Output {
            guid: request.guid.to_string(),
            source: request.path.to_string(),
            profile: &request.profile,
            asset_hash: format!("{:016x}", request.asset_hash),
            document: &request.document,
        };
        let bytes = match serde_json::to_vec_pretty(&output) {
            Ok(bytes) => bytes,
            Err(e) => return TransformStatus::failure(e.to_string()),
        };
        let target = output_path(request);
        match request.backend.write(&target, &bytes).await {
            Ok(()) => {
                tracing::debug!(path = %target.display(), "wrote transformed asset");
                TransformStatus::success()
            },
            Err(e) => TransformStatus::failure((*e).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_curator::{Guid, TransformFlags};
    use quarry_storage::BackendHandle;
    use quarry_storage::backend::{MockBackend, StorageBackend};
    use std::sync::Arc;

    #[test]
    fn test_parse_document() {
        let guid = Guid::from_u128(7);
        let json = format!(r#"{{"guid": "{guid}", "asset_type": "Material", "transform_dependencies": ["tex.png"]}}"#);
        let path = ProjectPath::parse("Base/mat.qasset").unwrap();
        let document = JsonAssets.parse_document(&path, json.as_bytes()).unwrap();
        assert_eq!(document.guid, guid);
        assert!(document.transform_dependencies.contains("tex.png"));

        let err = JsonAssets.parse_document(&path, b"[]").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_process_writes_output() {
        let backend = Arc::new(MockBackend::default().with_name("Base"));
        let handle: BackendHandle = backend.clone();
        let guid = Guid::from_u128(7);
        let request = TransformRequest {
            guid,
            path: ProjectPath::parse("Base/mat.qasset").unwrap(),
            document: Arc::new(AssetDocumentInfo::new(guid, "Material")),
            profile: "pc".to_string(),
            asset_hash: 255,
            thumb_hash: 0,
            flags: TransformFlags::default(),
            backend: handle,
        };
        assert!(JsonAssets.process(&request).await.is_success());

        let written = backend.read(&output_path(&request)).await.unwrap();
        let output: serde_json::Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(output["asset_hash"], "00000000000000ff");
        assert_eq!(output["source"], "Base/mat.qasset");
    }
}
