use crate::guid::Guid;
use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum CuratorEventKind {
    AssetAdded,
    AssetRemoved,
    AssetMoved,
    /// State, hashes or sub-asset data changed.
    AssetUpdated,
    /// The whole asset list was rebuilt (end of initialization).
    AssetListReset,
    ActivePlatformChanged,
}

/// Broadcast to every [`subscribe`](crate::Curator::subscribe)r.
///
/// `guid` is the main asset or sub-asset concerned, or `None` for events about
/// the curator as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuratorEvent {
    pub guid: Option<Guid>,
    pub kind: CuratorEventKind,
}

impl CuratorEvent {
    pub(crate) fn asset(guid: Guid, kind: CuratorEventKind) -> Self {
        Self { guid: Some(guid), kind }
    }

    pub(crate) fn global(kind: CuratorEventKind) -> Self {
        Self { guid: None, kind }
    }
}
