//! Everything guarded by the curator lock.
//!
//! No method in here performs I/O: callers gather file contents and hashes
//! outside the lock and hand the results in for bookkeeping.

use crate::document::{AssetDocumentInfo, DocumentTypeDescriptor, SubAssetData};
use crate::error::{Error, ErrorKind, Result};
use crate::events::CuratorEventKind;
use crate::guid::Guid;
use crate::index::{DependencyIndex, DependencyKind, Target};
use crate::ledger::TransformLedger;
use crate::registry::{AssetInfo, AssetRegistry};
use crate::state::{ExistenceState, LogEntry, TransformState};
use exn::ResultExt;
use quarry_storage::ProjectPath;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A dependency after resolution against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dependency {
    /// An asset, whether or not it is currently known.
    Asset(Guid),
    /// A plain file, which may or may not exist.
    File(ProjectPath),
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset(guid) => fmt::Display::fmt(guid, f),
            Self::File(path) => fmt::Display::fmt(path, f),
        }
    }
}

/// Parses a GUID as an asset and anything else as a project path.
impl FromStr for Dependency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(guid) = Guid::parse(s) {
            return Ok(Self::Asset(guid));
        }
        ProjectPath::parse(s).map(Self::File).or_raise(|| ErrorKind::InvalidDependency(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolved {
    Asset(Guid),
    File(ProjectPath),
    UnknownAsset(Guid),
    Invalid,
}

/// Freshly computed hashes, ready to be committed.
#[derive(Debug, Default)]
pub(crate) struct HashOutcome {
    pub(crate) asset_hash: u64,
    pub(crate) thumb_hash: u64,
    pub(crate) missing_transform_deps: BTreeSet<String>,
    pub(crate) missing_thumbnail_deps: BTreeSet<String>,
}

pub(crate) struct Catalog {
    pub(crate) registry: AssetRegistry,
    pub(crate) index: DependencyIndex,
    pub(crate) ledger: TransformLedger,
    pub(crate) profile: String,
    data_directories: HashSet<String>,
}

impl Catalog {
    pub(crate) fn new(registry: AssetRegistry, data_directories: impl IntoIterator<Item = String>, profile: String) -> Self {
        Self {
            registry,
            index: DependencyIndex::default(),
            ledger: TransformLedger::default(),
            profile,
            data_directories: data_directories.into_iter().collect(),
        }
    }

    fn target_for(&self, base_directory: &str, reference: &str) -> Option<Target> {
        if let Ok(guid) = Guid::parse(reference) {
            return Some(Target::Asset(guid));
        }
        ProjectPath::resolve(reference, base_directory, |name| self.data_directories.contains(name))
            .ok()
            .map(Target::Path)
    }

    /// Resolve a dependency string declared by an asset in `base_directory`.
    pub(crate) fn resolve(&self, base_directory: &str, reference: &str) -> Resolved {
        match self.target_for(base_directory, reference) {
            Some(Target::Asset(guid)) if self.registry.contains(&guid) => Resolved::Asset(guid),
            Some(Target::Asset(guid)) => Resolved::UnknownAsset(guid),
            Some(Target::Path(path)) => match self.registry.guid_at(&path) {
                Some(guid) => Resolved::Asset(guid),
                None => Resolved::File(path),
            },
            None => Resolved::Invalid,
        }
    }

    fn track_dependencies(&mut self, guid: Guid) {
        let Some(info) = self.registry.get(&guid) else {
            return;
        };
        let base = info.path.data_directory().to_string();
        let document = info.document.clone();
        let declared = [
            (DependencyKind::Transform, &document.transform_dependencies),
            (DependencyKind::Thumbnail, &document.thumbnail_dependencies),
            (DependencyKind::Package, &document.package_dependencies),
        ];
        for (kind, references) in declared {
            for reference in references {
                let Some(target) = self.target_for(&base, reference) else {
                    tracing::warn!(%guid, reference, "ignoring unresolvable dependency");
                    continue;
                };
                let known = match &target {
                    Target::Asset(referenced) => self.registry.contains(referenced),
                    Target::Path(_) => true,
                };
                self.index.track(guid, kind, target, known);
            }
        }
    }

    /// Add or update the asset described by `document`, found at `path`.
    pub(crate) fn register_document(
        &mut self,
        path: ProjectPath,
        descriptor: Arc<DocumentTypeDescriptor>,
        document: Arc<AssetDocumentInfo>,
        sub_assets: Vec<SubAssetData>,
    ) {
        let guid = document.guid;
        if let Some(previous) = self.registry.guid_at(&path)
            && previous != guid
        {
            tracing::info!(%path, %previous, %guid, "asset at path was replaced by a different asset");
            self.remove_asset(previous);
        }
        let main = SubAssetData {
            guid,
            name: path.file_stem().unwrap_or_default().to_string(),
            asset_type: descriptor.name.clone(),
            icon: None,
        };
        match self.registry.get(&guid).map(|info| info.path.clone()) {
            Some(previous_path) => {
                self.index.untrack(guid);
                if previous_path != path {
                    tracing::info!(%guid, from = %previous_path, to = %path, "asset moved");
                    let stranded = self.index.users_of_path(&previous_path, &DependencyKind::HASHED);
                    self.registry.relocate(guid, path.clone());
                    for user in stranded {
                        self.invalidate(user);
                    }
                }
                if let Some(info) = self.registry.get_mut(&guid) {
                    info.descriptor = descriptor;
                    info.document = document;
                }
                self.registry.set_existence(guid, ExistenceState::FileModified);
                self.track_dependencies(guid);
                self.registry.update_sub_assets(guid, main, sub_assets);
            },
            None => {
                self.registry.insert(AssetInfo::new(path, descriptor, document));
                self.track_dependencies(guid);
                self.registry.update_sub_assets(guid, main, sub_assets);
                for referencer in self.index.resolve_pending(guid) {
                    self.invalidate(referencer);
                }
            },
        }
        self.invalidate(guid);
    }

    /// Purge an asset for good. Everything depending on it is invalidated and
    /// will report it as missing.
    pub(crate) fn remove_asset(&mut self, guid: Guid) {
        let Some(path) = self.registry.get(&guid).map(|info| info.path.clone()) else {
            return;
        };
        let users = self.index.users_of_asset(guid, &path, &DependencyKind::HASHED);
        self.index.untrack(guid);
        self.index.unresolve(guid);
        self.ledger.forget(guid);
        self.registry.remove(guid);
        for user in users {
            self.invalidate(user);
        }
        tracing::debug!(%guid, %path, "removed asset");
    }

    /// The backing file is gone. Removal itself happens on the next update
    /// pass so a quick re-creation can update the asset in place.
    pub(crate) fn mark_removed(&mut self, guid: Guid) {
        self.registry.set_existence(guid, ExistenceState::FileRemoved);
        self.invalidate(guid);
    }

    /// Invalidate `guid` and, transitively, everything depending on it.
    pub(crate) fn invalidate(&mut self, guid: Guid) {
        let mut pending = vec![guid];
        let mut seen = HashSet::new();
        while let Some(next) = pending.pop() {
            if !seen.insert(next) {
                continue;
            }
            let Some(path) = self.registry.get(&next).map(|info| info.path.clone()) else {
                continue;
            };
            self.registry.invalidate_transform_state(next);
            pending.extend(self.index.users_of_asset(next, &path, &DependencyKind::HASHED));
        }
    }

    /// Invalidate the asset at `path` (if any) and everything depending on the
    /// file.
    pub(crate) fn invalidate_path(&mut self, path: &ProjectPath) {
        if let Some(guid) = self.registry.guid_at(path) {
            self.invalidate(guid);
        }
        for user in self.index.users_of_path(path, &DependencyKind::HASHED) {
            self.invalidate(user);
        }
    }

    pub(crate) fn invalidate_all(&mut self) {
        for guid in self.registry.guids() {
            self.registry.invalidate_transform_state(guid);
        }
    }

    fn transform_edges(&self, guid: Guid) -> Vec<Guid> {
        let Some(info) = self.registry.get(&guid) else {
            return Vec::new();
        };
        let base = info.path.data_directory();
        info.document
            .transform_dependencies
            .iter()
            .filter_map(|reference| match self.resolve(base, reference) {
                Resolved::Asset(dependency) => Some(dependency),
                _ => None,
            })
            .collect()
    }

    /// Members of every transform-dependency cycle reachable from `root`.
    pub(crate) fn find_cycles(&self, root: Guid) -> BTreeSet<Guid> {
        let mut members = BTreeSet::new();
        let mut finished = HashSet::new();
        let mut path = vec![root];
        let mut on_path = HashSet::from([root]);
        let mut stack = vec![(root, self.transform_edges(root))];
        while let Some(top) = stack.last_mut() {
            let node = top.0;
            match top.1.pop() {
                Some(next) if on_path.contains(&next) => {
                    let start = path.iter().position(|guid| *guid == next).unwrap_or(0);
                    members.extend(path[start..].iter().copied());
                },
                Some(next) if finished.contains(&next) => {},
                Some(next) => {
                    on_path.insert(next);
                    path.push(next);
                    stack.push((next, self.transform_edges(next)));
                },
                None => {
                    stack.pop();
                    path.pop();
                    on_path.remove(&node);
                    finished.insert(node);
                },
            }
        }
        members
    }

    pub(crate) fn mark_circular(&mut self, members: &BTreeSet<Guid>) {
        let names: Vec<String> = members
            .iter()
            .filter_map(|guid| self.registry.get(guid))
            .map(|info| info.path.to_string())
            .collect();
        let message = format!("circular transform dependency: {}", names.join(" -> "));
        for guid in members {
            let Some(info) = self.registry.get_mut(guid) else {
                continue;
            };
            info.asset_hash = 0;
            info.thumb_hash = 0;
            info.last_state_update += 1;
            info.missing_transform_deps.clear();
            info.missing_thumbnail_deps.clear();
            info.circular_dependencies = members.clone();
            info.log = vec![LogEntry::error(message.clone())];
            if self.registry.set_state(*guid, TransformState::CircularDependency) {
                tracing::warn!(guid = %guid, "{message}");
                self.registry.emit(*guid, CuratorEventKind::AssetUpdated);
            }
        }
    }

    /// State of `guid` derived from its current hashes and the ledger stamp
    /// for `profile`.
    pub(crate) fn derive_state(&self, guid: Guid, profile: &str) -> Option<TransformState> {
        let info = self.registry.get(&guid)?;
        let flags = info.descriptor.flags;
        let state = if !info.circular_dependencies.is_empty() {
            TransformState::CircularDependency
        } else if !info.missing_transform_deps.is_empty() {
            TransformState::MissingTransformDependency
        } else if !info.missing_thumbnail_deps.is_empty() {
            TransformState::MissingThumbnailDependency
        } else if info.document.needs_import {
            TransformState::NeedsImport
        } else if flags.disable_transform {
            TransformState::UpToDate
        } else {
            match self.ledger.get(guid, profile) {
                Some(stamp) if stamp.asset_hash == info.asset_hash && stamp.failed => TransformState::TransformError,
                Some(stamp) if stamp.asset_hash == info.asset_hash => {
                    if flags.supports_thumbnail && stamp.thumb_hash != Some(info.thumb_hash) {
                        TransformState::NeedsThumbnail
                    } else {
                        TransformState::UpToDate
                    }
                },
                _ => TransformState::NeedsTransform,
            }
        };
        Some(state)
    }

    /// Commit hashes computed outside the lock.
    ///
    /// Discarded (returning `None`) if `guid` was invalidated after `version`
    /// was read; it is then still stale and will be picked up again.
    pub(crate) fn commit_hash(&mut self, guid: Guid, version: u64, outcome: HashOutcome) -> Option<TransformState> {
        let info = self.registry.get_mut(&guid)?;
        if info.last_state_update != version {
            tracing::debug!(%guid, version, current = info.last_state_update, "discarding outdated hash result");
            return None;
        }
        let (asset_hash, thumb_hash) = if !outcome.missing_transform_deps.is_empty() {
            (0, 0)
        } else if !outcome.missing_thumbnail_deps.is_empty() {
            (outcome.asset_hash, 0)
        } else {
            (outcome.asset_hash, outcome.thumb_hash)
        };
        let hashes_changed = info.asset_hash != asset_hash || info.thumb_hash != thumb_hash;
        info.asset_hash = asset_hash;
        info.thumb_hash = thumb_hash;
        info.circular_dependencies.clear();
        info.log = outcome
            .missing_transform_deps
            .iter()
            .map(|missing| LogEntry::warning(format!("missing transform dependency: {missing}")))
            .chain(
                outcome
                    .missing_thumbnail_deps
                    .iter()
                    .map(|missing| LogEntry::warning(format!("missing thumbnail dependency: {missing}"))),
            )
            .collect();
        info.missing_transform_deps = outcome.missing_transform_deps;
        info.missing_thumbnail_deps = outcome.missing_thumbnail_deps;
        let state = self.derive_state(guid, &self.profile)?;
        if self.registry.set_state(guid, state) || hashes_changed {
            self.registry.emit(guid, CuratorEventKind::AssetUpdated);
        }
        Some(state)
    }

    /// Re-derive the state of an already hashed asset after the ledger changed.
    pub(crate) fn refresh_state(&mut self, guid: Guid) -> Option<TransformState> {
        let current = self.registry.get(&guid)?.transform_state;
        if matches!(current, TransformState::Unknown | TransformState::CircularDependency) {
            return Some(current);
        }
        let state = self.derive_state(guid, &self.profile)?;
        if self.registry.set_state(guid, state) {
            self.registry.emit(guid, CuratorEventKind::AssetUpdated);
        }
        Some(state)
    }

    /// State of `guid` for `profile`, which may differ from the active one.
    pub(crate) fn state_for_profile(&self, guid: Guid, profile: &str) -> Option<TransformState> {
        let current = self.registry.get(&guid)?.transform_state;
        if current == TransformState::Unknown || profile == self.profile {
            return Some(current);
        }
        self.derive_state(guid, profile)
    }

    pub(crate) fn append_log(&mut self, guid: Guid, entry: LogEntry) {
        if let Some(info) = self.registry.get_mut(&guid) {
            info.log.push(entry);
            self.registry.emit(guid, CuratorEventKind::AssetUpdated);
        }
    }

    /// Record a failure that happened before hashing (e.g. the asset file
    /// could no longer be parsed).
    pub(crate) fn record_failure(&mut self, guid: Guid, message: String) {
        let Some(info) = self.registry.get_mut(&guid) else {
            return;
        };
        info.log = vec![LogEntry::error(message)];
        if self.registry.set_state(guid, TransformState::TransformError) {
            self.registry.emit(guid, CuratorEventKind::AssetUpdated);
        }
    }

    pub(crate) fn set_profile(&mut self, profile: &str) -> bool {
        if self.profile == profile {
            return false;
        }
        self.profile = profile.to_string();
        self.invalidate_all();
        self.registry.emit_global(CuratorEventKind::ActivePlatformChanged);
        true
    }

    pub(crate) fn next_asset_to_update(&mut self) -> Option<(Guid, ProjectPath)> {
        self.registry.next_stale()
    }

    pub(crate) fn on_update_task_finished(&mut self, guid: Guid) -> bool {
        self.registry.finish_update(guid)
    }

    pub(crate) fn state_counts(&self) -> BTreeMap<TransformState, usize> {
        self.registry.counts()
    }

    fn as_known_asset(&self, dependency: &Dependency) -> Option<Guid> {
        match dependency {
            Dependency::Asset(guid) => self.registry.contains(guid).then_some(*guid),
            Dependency::File(path) => self.registry.guid_at(path),
        }
    }

    pub(crate) fn direct_dependencies(&self, guid: Guid, kinds: &[DependencyKind]) -> Vec<Dependency> {
        let Some(info) = self.registry.get(&guid) else {
            return Vec::new();
        };
        let base = info.path.data_directory();
        let mut dependencies = Vec::new();
        for kind in kinds {
            let references = match kind {
                DependencyKind::Transform => &info.document.transform_dependencies,
                DependencyKind::Thumbnail => &info.document.thumbnail_dependencies,
                DependencyKind::Package => &info.document.package_dependencies,
            };
            for reference in references {
                match self.resolve(base, reference) {
                    Resolved::Asset(dependency) | Resolved::UnknownAsset(dependency) => {
                        dependencies.push(Dependency::Asset(dependency))
                    },
                    Resolved::File(path) => dependencies.push(Dependency::File(path)),
                    Resolved::Invalid => {},
                }
            }
        }
        dependencies
    }

    /// Forward closure over `kinds`, starting from the dependencies of `start`.
    pub(crate) fn transitive_hull(&self, start: &Dependency, kinds: &[DependencyKind]) -> BTreeSet<Dependency> {
        let mut hull = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<Guid> = self.as_known_asset(start).into_iter().collect();
        while let Some(guid) = queue.pop_front() {
            if !visited.insert(guid) {
                continue;
            }
            for dependency in self.direct_dependencies(guid, kinds) {
                if let Some(next) = self.as_known_asset(&dependency) {
                    queue.push_back(next);
                }
                hull.insert(dependency);
            }
        }
        hull
    }

    fn direct_users(&self, target: &Dependency, kinds: &[DependencyKind]) -> HashSet<Guid> {
        match (target, self.as_known_asset(target)) {
            (_, Some(guid)) => {
                let mut users = self.registry.get(&guid).map_or_else(HashSet::new, |info| {
                    self.index.users_of_asset(guid, &info.path, kinds)
                });
                if let Dependency::File(path) = target {
                    users.extend(self.index.users_of_path(path, kinds));
                }
                users
            },
            (Dependency::Asset(guid), None) => {
                let target = Target::Asset(*guid);
                kinds.iter().flat_map(|kind| self.index.users(*kind, &target)).collect()
            },
            (Dependency::File(path), None) => self.index.users_of_path(path, kinds),
        }
    }

    /// Backward closure over `kinds`: every asset that (transitively) depends
    /// on `start`.
    pub(crate) fn inverse_transitive_hull(&self, start: &Dependency, kinds: &[DependencyKind]) -> BTreeSet<Guid> {
        let start_guid = self.as_known_asset(start);
        let mut hull = BTreeSet::new();
        let mut queue: VecDeque<Guid> = self.direct_users(start, kinds).into_iter().collect();
        while let Some(guid) = queue.pop_front() {
            if Some(guid) == start_guid || !hull.insert(guid) {
                continue;
            }
            if let Some(info) = self.registry.get(&guid) {
                queue.extend(self.index.users_of_asset(guid, &info.path, kinds));
            }
        }
        hull
    }

    pub(crate) fn find_all_uses(&self, target: &Dependency, transitive: bool) -> BTreeSet<Guid> {
        if transitive {
            self.inverse_transitive_hull(target, &DependencyKind::HASHED)
        } else {
            let start_guid = self.as_known_asset(target);
            self.direct_users(target, &DependencyKind::HASHED)
                .into_iter()
                .filter(|guid| Some(*guid) != start_guid)
                .collect()
        }
    }
}
