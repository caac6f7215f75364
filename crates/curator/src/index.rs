//! Inverse dependency tracking and forward-reference resolution.
//!
//! Assets reference their dependencies either by path or by GUID. Path
//! references are tracked under the path whether or not anything exists there
//! yet. GUID references are tracked under the GUID once that asset is known,
//! and parked in the unresolved set until then.

use crate::guid::Guid;
use quarry_storage::ProjectPath;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Transform,
    Thumbnail,
    /// Only used for hull queries.
    Package,
}

impl DependencyKind {
    pub const ALL: [Self; 3] = [Self::Transform, Self::Thumbnail, Self::Package];
    /// The kinds that affect hashes and therefore propagate invalidation.
    pub const HASHED: [Self; 2] = [Self::Transform, Self::Thumbnail];

    fn index(self) -> usize {
        match self {
            Self::Transform => 0,
            Self::Thumbnail => 1,
            Self::Package => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Target {
    Path(ProjectPath),
    Asset(Guid),
}

type Inverse = HashMap<Target, HashSet<Guid>>;
type Unresolved = HashMap<Guid, HashSet<Guid>>;

#[derive(Debug, Default)]
pub(crate) struct DependencyIndex {
    inverse: [Inverse; 3],
    /// Referenced GUID to the assets referencing it.
    unresolved: [Unresolved; 3],
    /// What each referencer tracked, so untracking removes exactly that.
    tracked: HashMap<Guid, Vec<(DependencyKind, Target)>>,
}

fn remove_from<K: Eq + std::hash::Hash>(map: &mut HashMap<K, HashSet<Guid>>, key: &K, guid: &Guid) {
    if let Some(set) = map.get_mut(key) {
        set.remove(guid);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

impl DependencyIndex {
    /// Record that `referencer` depends on `target`.
    ///
    /// `known` says whether an [`Target::Asset`] target is already in the
    /// registry; unknown ones go to the unresolved set.
    pub(crate) fn track(&mut self, referencer: Guid, kind: DependencyKind, target: Target, known: bool) {
        match (&target, known) {
            (Target::Asset(referenced), false) => {
                self.unresolved[kind.index()].entry(*referenced).or_default().insert(referencer);
            },
            _ => {
                self.inverse[kind.index()].entry(target.clone()).or_default().insert(referencer);
            },
        }
        self.tracked.entry(referencer).or_default().push((kind, target));
    }

    /// Forget everything `referencer` tracked.
    pub(crate) fn untrack(&mut self, referencer: Guid) {
        let Some(entries) = self.tracked.remove(&referencer) else {
            return;
        };
        for (kind, target) in entries {
            remove_from(&mut self.inverse[kind.index()], &target, &referencer);
            if let Target::Asset(referenced) = target {
                remove_from(&mut self.unresolved[kind.index()], &referenced, &referencer);
            }
        }
    }

    /// `guid` was just registered: move references waiting for it into the
    /// inverse trackers.
    ///
    /// Returns the referencers whose hashes may now be computable (package
    /// references don't count).
    pub(crate) fn resolve_pending(&mut self, guid: Guid) -> HashSet<Guid> {
        let mut invalidate = HashSet::new();
        for kind in DependencyKind::ALL {
            let Some(referencers) = self.unresolved[kind.index()].remove(&guid) else {
                continue;
            };
            if kind != DependencyKind::Package {
                invalidate.extend(referencers.iter().copied());
            }
            self.inverse[kind.index()].entry(Target::Asset(guid)).or_default().extend(referencers);
        }
        invalidate
    }

    /// `guid` is gone: references to it become unresolved again.
    pub(crate) fn unresolve(&mut self, guid: Guid) {
        for kind in DependencyKind::ALL {
            if let Some(referencers) = self.inverse[kind.index()].remove(&Target::Asset(guid)) {
                self.unresolved[kind.index()].entry(guid).or_default().extend(referencers);
            }
        }
    }

    pub(crate) fn users(&self, kind: DependencyKind, target: &Target) -> impl Iterator<Item = Guid> + '_ {
        self.inverse[kind.index()].get(target).into_iter().flatten().copied()
    }

    /// Everything depending on the asset `guid` living at `path`, by GUID or
    /// by path, through any of `kinds`.
    pub(crate) fn users_of_asset(&self, guid: Guid, path: &ProjectPath, kinds: &[DependencyKind]) -> HashSet<Guid> {
        let by_guid = Target::Asset(guid);
        let by_path = Target::Path(path.clone());
        kinds
            .iter()
            .flat_map(|kind| self.users(*kind, &by_guid).chain(self.users(*kind, &by_path)))
            .filter(|user| *user != guid)
            .collect()
    }

    pub(crate) fn users_of_path(&self, path: &ProjectPath, kinds: &[DependencyKind]) -> HashSet<Guid> {
        let target = Target::Path(path.clone());
        kinds.iter().flat_map(|kind| self.users(*kind, &target)).collect()
    }

    #[cfg(test)]
    pub(crate) fn is_unresolved(&self, kind: DependencyKind, referenced: Guid, referencer: Guid) -> bool {
        self.unresolved[kind.index()].get(&referenced).is_some_and(|set| set.contains(&referencer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(value: &str) -> ProjectPath {
        ProjectPath::parse(value).unwrap()
    }

    #[test]
    fn test_track_and_untrack_paths() {
        let mut index = DependencyIndex::default();
        let a = Guid::from_u128(1);
        let b = Guid::from_u128(2);
        let texture = Target::Path(path("Base/tex.png"));
        index.track(a, DependencyKind::Transform, texture.clone(), true);
        index.track(b, DependencyKind::Thumbnail, texture.clone(), true);
        assert_eq!(index.users_of_path(&path("Base/tex.png"), &DependencyKind::HASHED), HashSet::from([a, b]));
        assert_eq!(index.users_of_path(&path("Base/tex.png"), &[DependencyKind::Transform]), HashSet::from([a]));
        index.untrack(a);
        assert_eq!(index.users(DependencyKind::Transform, &texture).count(), 0);
        assert!(index.inverse[0].is_empty());
    }

    #[test]
    fn test_forward_reference_resolves_on_discovery() {
        let mut index = DependencyIndex::default();
        let material = Guid::from_u128(1);
        let shader = Guid::from_u128(2);
        let package = Guid::from_u128(3);
        index.track(material, DependencyKind::Transform, Target::Asset(shader), false);
        index.track(package, DependencyKind::Package, Target::Asset(shader), false);
        assert!(index.is_unresolved(DependencyKind::Transform, shader, material));

        let invalidate = index.resolve_pending(shader);
        assert_eq!(invalidate, HashSet::from([material]));
        assert!(!index.is_unresolved(DependencyKind::Transform, shader, material));
        let users = index.users_of_asset(shader, &path("Base/shader.qasset"), &DependencyKind::ALL);
        assert_eq!(users, HashSet::from([material, package]));

        index.unresolve(shader);
        assert!(index.is_unresolved(DependencyKind::Transform, shader, material));
        index.untrack(material);
        assert!(!index.is_unresolved(DependencyKind::Transform, shader, material));
    }

    #[test]
    fn test_users_of_asset_combines_guid_and_path_references() {
        let mut index = DependencyIndex::default();
        let texture = Guid::from_u128(10);
        let by_guid = Guid::from_u128(1);
        let by_path = Guid::from_u128(2);
        index.track(by_guid, DependencyKind::Transform, Target::Asset(texture), true);
        index.track(by_path, DependencyKind::Transform, Target::Path(path("Base/stone.qtex")), true);
        let users = index.users_of_asset(texture, &path("Base/stone.qtex"), &DependencyKind::HASHED);
        assert_eq!(users, HashSet::from([by_guid, by_path]));
    }
}
