//! The authoritative table of known assets and sub-assets.

use crate::document::{AssetDocumentInfo, DocumentTypeDescriptor, SubAssetData};
use crate::events::{CuratorEvent, CuratorEventKind};
use crate::guid::Guid;
use crate::state::{ExistenceState, LogEntry, TransformState};
use quarry_storage::ProjectPath;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use time::UtcDateTime;
use tokio::sync::broadcast;

/// One main asset.
///
/// `asset_hash` and `thumb_hash` are only meaningful while `transform_state`
/// is not [`TransformState::Unknown`].
#[derive(Debug, Clone)]
pub struct AssetInfo {
    pub guid: Guid,
    pub path: ProjectPath,
    pub existence: ExistenceState,
    pub transform_state: TransformState,
    pub asset_hash: u64,
    pub thumb_hash: u64,
    /// Bumped on every invalidation. Results computed outside the curator
    /// lock are discarded if this moved in the meantime.
    pub last_state_update: u64,
    pub missing_transform_deps: BTreeSet<String>,
    pub missing_thumbnail_deps: BTreeSet<String>,
    pub circular_dependencies: BTreeSet<Guid>,
    /// Never contains `guid` itself.
    pub sub_assets: BTreeSet<Guid>,
    pub log: Vec<LogEntry>,
    pub descriptor: Arc<DocumentTypeDescriptor>,
    pub document: Arc<AssetDocumentInfo>,
}

impl AssetInfo {
    pub(crate) fn new(path: ProjectPath, descriptor: Arc<DocumentTypeDescriptor>, document: Arc<AssetDocumentInfo>) -> Self {
        Self {
            guid: document.guid,
            path,
            existence: ExistenceState::FileAdded,
            transform_state: TransformState::Unknown,
            asset_hash: 0,
            thumb_hash: 0,
            last_state_update: 0,
            missing_transform_deps: BTreeSet::new(),
            missing_thumbnail_deps: BTreeSet::new(),
            circular_dependencies: BTreeSet::new(),
            sub_assets: BTreeSet::new(),
            log: Vec::new(),
            descriptor,
            document,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubAsset {
    pub existence: ExistenceState,
    pub last_access: Option<UtcDateTime>,
    /// The main sub-asset shares its GUID with its asset.
    pub is_main: bool,
    /// GUID of the owning [`AssetInfo`].
    pub owner: Guid,
    pub data: SubAssetData,
}

pub(crate) struct AssetRegistry {
    assets: HashMap<Guid, AssetInfo>,
    sub_assets: HashMap<Guid, SubAsset>,
    paths: HashMap<ProjectPath, Guid>,
    buckets: HashMap<TransformState, HashSet<Guid>>,
    stale: HashSet<Guid>,
    updating: HashSet<Guid>,
    changed_sub_assets: HashSet<Guid>,
    events: broadcast::Sender<CuratorEvent>,
}

impl AssetRegistry {
    pub(crate) fn new(events: broadcast::Sender<CuratorEvent>) -> Self {
        Self {
            assets: HashMap::new(),
            sub_assets: HashMap::new(),
            paths: HashMap::new(),
            buckets: HashMap::new(),
            stale: HashSet::new(),
            updating: HashSet::new(),
            changed_sub_assets: HashSet::new(),
            events,
        }
    }

    pub(crate) fn emit(&self, guid: Guid, kind: CuratorEventKind) {
        // No subscribers is not an error.
        _ = self.events.send(CuratorEvent::asset(guid, kind));
    }

    pub(crate) fn emit_global(&self, kind: CuratorEventKind) {
        _ = self.events.send(CuratorEvent::global(kind));
    }

    pub(crate) fn get(&self, guid: &Guid) -> Option<&AssetInfo> {
        self.assets.get(guid)
    }

    /// `transform_state` must only ever be changed through [`Self::set_state`].
    pub(crate) fn get_mut(&mut self, guid: &Guid) -> Option<&mut AssetInfo> {
        self.assets.get_mut(guid)
    }

    pub(crate) fn contains(&self, guid: &Guid) -> bool {
        self.assets.contains_key(guid)
    }

    pub(crate) fn guid_at(&self, path: &ProjectPath) -> Option<Guid> {
        self.paths.get(path).copied()
    }

    pub(crate) fn assets(&self) -> impl Iterator<Item = &AssetInfo> {
        self.assets.values()
    }

    pub(crate) fn guids(&self) -> Vec<Guid> {
        let mut guids: Vec<_> = self.assets.keys().copied().collect();
        guids.sort();
        guids
    }

    pub(crate) fn sub_asset(&self, guid: &Guid) -> Option<&SubAsset> {
        self.sub_assets.get(guid)
    }

    pub(crate) fn sub_asset_mut(&mut self, guid: &Guid) -> Option<&mut SubAsset> {
        self.sub_assets.get_mut(guid)
    }

    /// Add a freshly discovered asset. It starts out `Unknown` and stale.
    pub(crate) fn insert(&mut self, mut info: AssetInfo) {
        let guid = info.guid;
        info.transform_state = TransformState::Unknown;
        self.paths.insert(info.path.clone(), guid);
        self.buckets.entry(TransformState::Unknown).or_default().insert(guid);
        self.stale.insert(guid);
        self.assets.insert(guid, info);
        self.emit(guid, CuratorEventKind::AssetAdded);
    }

    pub(crate) fn relocate(&mut self, guid: Guid, path: ProjectPath) {
        let Some(info) = self.assets.get_mut(&guid) else {
            return;
        };
        let previous = std::mem::replace(&mut info.path, path.clone());
        if self.paths.get(&previous) == Some(&guid) {
            self.paths.remove(&previous);
        }
        self.paths.insert(path, guid);
        self.emit(guid, CuratorEventKind::AssetMoved);
    }

    /// Remove an asset together with its sub-assets.
    pub(crate) fn remove(&mut self, guid: Guid) -> Option<AssetInfo> {
        self.remove_transform_state(guid);
        let info = self.assets.remove(&guid)?;
        if self.paths.get(&info.path) == Some(&guid) {
            self.paths.remove(&info.path);
        }
        for sub_asset in info.sub_assets.iter().chain(std::iter::once(&guid)) {
            self.sub_assets.remove(sub_asset);
            self.changed_sub_assets.remove(sub_asset);
        }
        self.emit(guid, CuratorEventKind::AssetRemoved);
        Some(info)
    }

    pub(crate) fn set_existence(&mut self, guid: Guid, existence: ExistenceState) {
        if let Some(info) = self.assets.get_mut(&guid) {
            info.existence = existence;
        }
        if let Some(main) = self.sub_assets.get_mut(&guid) {
            main.existence = existence;
        }
    }

    /// The one place that changes `transform_state`, keeping the state
    /// buckets and the stale set in agreement with the asset records.
    ///
    /// Returns `true` if the state changed.
    pub(crate) fn set_state(&mut self, guid: Guid, state: TransformState) -> bool {
        let Some(info) = self.assets.get_mut(&guid) else {
            return false;
        };
        let previous = std::mem::replace(&mut info.transform_state, state);
        if let Some(bucket) = self.buckets.get_mut(&previous) {
            bucket.remove(&guid);
        }
        self.buckets.entry(state).or_default().insert(guid);
        if state != TransformState::Unknown {
            self.stale.remove(&guid);
        }
        previous != state
    }

    /// Mark the cached state of `guid` as no longer trustworthy.
    pub(crate) fn invalidate_transform_state(&mut self, guid: Guid) -> bool {
        let Some(info) = self.assets.get_mut(&guid) else {
            return false;
        };
        info.last_state_update += 1;
        self.set_state(guid, TransformState::Unknown);
        self.stale.insert(guid);
        true
    }

    pub(crate) fn remove_transform_state(&mut self, guid: Guid) {
        if let Some(info) = self.assets.get(&guid)
            && let Some(bucket) = self.buckets.get_mut(&info.transform_state)
        {
            bucket.remove(&guid);
        }
        self.stale.remove(&guid);
        self.updating.remove(&guid);
    }

    /// Pop one stale asset that isn't already being updated and mark it
    /// in-flight.
    pub(crate) fn next_stale(&mut self) -> Option<(Guid, ProjectPath)> {
        loop {
            let guid = self.stale.iter().find(|guid| !self.updating.contains(guid)).copied()?;
            self.stale.remove(&guid);
            if let Some(info) = self.assets.get(&guid) {
                self.updating.insert(guid);
                return Some((guid, info.path.clone()));
            }
        }
    }

    /// Clear the in-flight mark. Returns `true` if more work is waiting.
    pub(crate) fn finish_update(&mut self, guid: Guid) -> bool {
        self.updating.remove(&guid);
        self.has_pending_updates()
    }

    fn has_pending_updates(&self) -> bool {
        self.stale.iter().any(|guid| !self.updating.contains(guid))
    }

    #[cfg(test)]
    pub(crate) fn is_updating(&self, guid: &Guid) -> bool {
        self.updating.contains(guid)
    }

    #[cfg(test)]
    pub(crate) fn is_stale(&self, guid: &Guid) -> bool {
        self.stale.contains(guid)
    }

    /// Diff the sub-assets of `guid` against what its document manager just
    /// enumerated.
    ///
    /// Sub-assets whose display data changed are queued for the next
    /// main-thread tick instead of being announced one by one.
    pub(crate) fn update_sub_assets(&mut self, guid: Guid, main: SubAssetData, sub_assets: Vec<SubAssetData>) {
        let Some(previous) = self.assets.get(&guid).map(|info| info.sub_assets.clone()) else {
            return;
        };
        let existence = self.assets.get(&guid).map_or(ExistenceState::FileAdded, |info| info.existence);
        self.upsert_sub_asset(guid, main, true, existence);
        let mut current = BTreeSet::new();
        for data in sub_assets {
            if data.guid == guid {
                continue;
            }
            if let Some(other) = self.sub_assets.get(&data.guid)
                && other.owner != guid
            {
                tracing::warn!(sub_asset = %data.guid, owner = %other.owner, claimed_by = %guid, "sub-asset GUID claimed by two assets");
                continue;
            }
            current.insert(data.guid);
            self.upsert_sub_asset(guid, data, false, existence);
        }
        for removed in previous.difference(&current) {
            self.sub_assets.remove(removed);
            self.changed_sub_assets.remove(removed);
            self.emit(*removed, CuratorEventKind::AssetRemoved);
        }
        if let Some(info) = self.assets.get_mut(&guid) {
            info.sub_assets = current;
        }
    }

    fn upsert_sub_asset(&mut self, owner: Guid, data: SubAssetData, is_main: bool, existence: ExistenceState) {
        let guid = data.guid;
        match self.sub_assets.get_mut(&guid) {
            Some(existing) => {
                existing.owner = owner;
                existing.is_main = is_main;
                existing.existence = existence;
                if existing.data != data {
                    existing.data = data;
                    self.changed_sub_assets.insert(guid);
                }
            },
            None => {
                let sub_asset = SubAsset { existence, last_access: None, is_main, owner, data };
                self.sub_assets.insert(guid, sub_asset);
                if !is_main {
                    self.changed_sub_assets.insert(guid);
                }
            },
        }
    }

    pub(crate) fn take_changed_sub_assets(&mut self) -> Vec<Guid> {
        let mut changed: Vec<_> = self.changed_sub_assets.drain().collect();
        changed.sort();
        changed
    }

    pub(crate) fn counts(&self) -> BTreeMap<TransformState, usize> {
        TransformState::ALL
            .into_iter()
            .map(|state| (state, self.buckets.get(&state).map_or(0, HashSet::len)))
            .collect()
    }
}
