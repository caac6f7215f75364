//! Incremental, dependency-tracking asset curation.
//!
//! The [`Curator`] keeps a registry of every asset in a project's data
//! directories, tracks the transform, thumbnail and package dependencies
//! between them, and derives for each asset whether its transformed output is
//! still current. Hashes are combined transitively across dependencies, so a
//! change to any input invalidates exactly the assets that depend on it.
//!
//! ```no_run
//! # use quarry_curator::{Curator, CuratorOptions, DocumentManagerRegistry, TransformFlags};
//! # async fn example(backends: Vec<quarry_storage::BackendHandle>, managers: DocumentManagerRegistry) -> quarry_curator::error::Result<()> {
//! let curator = Curator::new(CuratorOptions::default(), backends, managers)?;
//! curator.start_initialize();
//! curator.wait_for_initialize().await?;
//! let summary = curator.transform_all_assets(TransformFlags::default(), None).await;
//! println!("{} transformed, {} failed", summary.transformed, summary.failed);
//! curator.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod catalog;
mod curator;
mod document;
pub mod error;
mod events;
mod file_status;
mod guid;
mod hashing;
mod index;
mod ledger;
mod registry;
mod scheduler;
mod state;
mod transform;

pub use crate::catalog::Dependency;
pub use crate::curator::{Curator, CuratorGuard, CuratorOptions};
pub use crate::document::{
    AssetDocumentInfo, DocumentFlags, DocumentManager, DocumentManagerRegistry, DocumentTypeDescriptor, SubAssetData,
    TransformFlags, TransformRequest, TransformResult, TransformStatus,
};
pub use crate::events::{CuratorEvent, CuratorEventKind};
pub use crate::guid::Guid;
pub use crate::index::DependencyKind;
pub use crate::registry::{AssetInfo, SubAsset};
pub use crate::state::{ExistenceState, LogEntry, LogLevel, TransformState};
pub use crate::transform::TransformSummary;
