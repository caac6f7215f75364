//! Transitive dependency hashing.
//!
//! An asset's hash folds its own settings hash together with the hashes of
//! everything it depends on: raw file contents for plain files, and the
//! (recursively brought up to date) combined hash for assets. Files are read
//! outside the curator lock; the lock is only taken to plan and to commit.

use crate::catalog::{HashOutcome, Resolved};
use crate::curator::Inner;
use crate::guid::Guid;
use crate::index::DependencyKind;
use crate::state::TransformState;
use futures::future::BoxFuture;
use quarry_storage::{BackendHandle, ProjectPath};
use std::collections::BTreeSet;

/// Fold one dependency hash into a running hash.
///
/// Addition commutes, so reordering a dependency list never changes the
/// result.
pub(crate) fn combine(accumulator: u64, hash: u64) -> u64 {
    accumulator.wrapping_add(hash)
}

enum Input {
    Asset(Guid),
    File(ProjectPath, BackendHandle),
    Missing,
}

struct HashPlan {
    version: u64,
    settings_hash: u64,
    transform: Vec<(String, Input)>,
    thumbnail: Vec<(String, Input)>,
}

enum Prepared {
    Done(Option<TransformState>),
    Plan(HashPlan),
}

impl Inner {
    fn input_for(&self, resolved: Resolved) -> Input {
        match resolved {
            Resolved::Asset(guid) => Input::Asset(guid),
            Resolved::File(path) => match self.backends.get(path.data_directory()) {
                Some(backend) => Input::File(path, backend.clone()),
                None => Input::Missing,
            },
            Resolved::UnknownAsset(_) | Resolved::Invalid => Input::Missing,
        }
    }

    fn prepare_hash(&self, guid: Guid, force: bool) -> Prepared {
        let mut catalog = self.catalog();
        let Some(info) = catalog.registry.get(&guid) else {
            return Prepared::Done(None);
        };
        if !info.existence.exists() {
            return Prepared::Done(None);
        }
        if info.transform_state != TransformState::Unknown && !force {
            return Prepared::Done(Some(info.transform_state));
        }
        // A cycle would make the recursive hashing below non-terminating.
        let cycle = catalog.find_cycles(guid);
        if !cycle.is_empty() {
            catalog.mark_circular(&cycle);
            if cycle.contains(&guid) {
                return Prepared::Done(Some(TransformState::CircularDependency));
            }
        }
        let Some(info) = catalog.registry.get(&guid) else {
            return Prepared::Done(None);
        };
        let base = info.path.data_directory();
        let document = info.document.clone();
        let plan = |references: &BTreeSet<String>| -> Vec<(String, Input)> {
            references
                .iter()
                .map(|reference| (reference.clone(), self.input_for(catalog.resolve(base, reference))))
                .collect()
        };
        Prepared::Plan(HashPlan {
            version: info.last_state_update,
            settings_hash: document.settings_hash,
            transform: plan(&document.transform_dependencies),
            thumbnail: plan(&document.thumbnail_dependencies),
        })
    }

    /// Recompute the hashes and state of `guid` if it is `Unknown` (or
    /// `force` is set), bringing asset dependencies up to date first.
    ///
    /// `visiting` holds the assets currently being hashed further up the
    /// call chain. Returns `None` for unknown or removed assets and for
    /// results discarded because the asset changed while being hashed.
    pub(crate) fn update_asset_transform_state<'a>(
        &'a self,
        guid: Guid,
        force: bool,
        visiting: &'a mut Vec<Guid>,
    ) -> BoxFuture<'a, Option<TransformState>> {
        Box::pin(async move {
            let plan = match self.prepare_hash(guid, force) {
                Prepared::Done(state) => return state,
                Prepared::Plan(plan) => plan,
            };
            visiting.push(guid);
            let mut asset_hash = plan.settings_hash;
            let mut missing_transform_deps = BTreeSet::new();
            for (reference, input) in &plan.transform {
                match self.dependency_hash(input, DependencyKind::Transform, force, visiting).await {
                    Some(hash) => asset_hash = combine(asset_hash, hash),
                    None => {
                        missing_transform_deps.insert(reference.clone());
                    },
                }
            }
            // Thumbnails depend on everything the transform does, plus more.
            let mut thumb_hash = asset_hash;
            let mut missing_thumbnail_deps = BTreeSet::new();
            for (reference, input) in &plan.thumbnail {
                match self.dependency_hash(input, DependencyKind::Thumbnail, force, visiting).await {
                    Some(hash) => thumb_hash = combine(thumb_hash, hash),
                    None => {
                        missing_thumbnail_deps.insert(reference.clone());
                    },
                }
            }
            visiting.pop();
            let outcome = HashOutcome { asset_hash, thumb_hash, missing_transform_deps, missing_thumbnail_deps };
            let state = self.catalog().commit_hash(guid, plan.version, outcome);
            tracing::debug!(%guid, ?state, asset_hash, thumb_hash, "hashed asset");
            state
        })
    }

    async fn dependency_hash(
        &self,
        input: &Input,
        kind: DependencyKind,
        force: bool,
        visiting: &mut Vec<Guid>,
    ) -> Option<u64> {
        match input {
            Input::Missing => None,
            Input::File(path, backend) => match self.file_status.hash_file(backend, path, force).await {
                Ok(hash) => Some(hash),
                Err(e) => {
                    if !e.is_not_found() {
                        tracing::warn!(%path, error = ?e, "could not hash dependency");
                    }
                    None
                },
            },
            Input::Asset(dependency) if visiting.contains(dependency) => match kind {
                // A thumbnail may reference an asset further up the chain
                // (e.g. a preview scene); use whatever it last committed.
                DependencyKind::Thumbnail => {
                    let catalog = self.catalog();
                    catalog.registry.get(dependency).map(|info| info.thumb_hash)
                },
                _ => None,
            },
            Input::Asset(dependency) => {
                self.update_asset_transform_state(*dependency, false, visiting).await;
                let catalog = self.catalog();
                let info = catalog.registry.get(dependency)?;
                if !info.existence.exists() || info.transform_state.is_unusable_dependency() {
                    return None;
                }
                match kind {
                    DependencyKind::Transform => Some(info.asset_hash),
                    DependencyKind::Thumbnail if info.transform_state == TransformState::MissingThumbnailDependency => None,
                    DependencyKind::Thumbnail => Some(info.thumb_hash),
                    DependencyKind::Package => None,
                }
            },
        }
    }
}
