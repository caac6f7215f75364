//! The curator façade.
//!
//! [`Curator`] is a cheap, cloneable handle. All shared bookkeeping lives in
//! a [`Catalog`] behind one mutex (the curator lock); file I/O, parsing and
//! document manager calls always happen with that lock released.

use crate::catalog::{Catalog, Dependency};
use crate::document::{AssetDocumentInfo, DocumentManagerRegistry, DocumentTypeDescriptor, SubAssetData};
use crate::document::{TransformFlags, TransformStatus};
use crate::error::{ErrorKind, Result};
use crate::events::{CuratorEvent, CuratorEventKind};
use crate::file_status::FileStatusCache;
use crate::guid::Guid;
use crate::index::DependencyKind;
use crate::registry::{AssetInfo, AssetRegistry, SubAsset};
use crate::scheduler::UpdateTask;
use crate::state::TransformState;
use crate::transform::TransformSummary;
use exn::ResultExt;
use futures::{StreamExt, stream};
use quarry_cache::{CacheSnapshot, Database, Repository};
use quarry_config::Config;
use quarry_storage::{BackendHandle, FileInfo, ProjectPath};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::UtcDateTime;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tracing::instrument;

const EVENT_CAPACITY: usize = 1024;
const DEFAULT_SCAN_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuratorOptions {
    /// Where file statuses, parsed documents and transform stamps persist
    /// between runs. `None` keeps everything in memory.
    pub cache_path: Option<PathBuf>,
    /// Asset files parsed in parallel during the initial scan.
    pub scan_concurrency: usize,
    /// Project paths of assets processed before anything else.
    pub core_assets: Vec<String>,
    pub active_profile: String,
    /// Run the update worker after initialization. Tests turn this off and
    /// drive updates with [`Curator::process_pending_updates`].
    pub background_updates: bool,
    /// Never write the cache back.
    pub dry_run: bool,
}

impl Default for CuratorOptions {
    fn default() -> Self {
        Self {
            cache_path: None,
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
            core_assets: Vec::new(),
            active_profile: quarry_config::DEFAULT_PROFILE.to_string(),
            background_updates: true,
            dry_run: false,
        }
    }
}

impl CuratorOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            cache_path: Some(config.cache_path().or_raise(|| ErrorKind::Config)?),
            scan_concurrency: config.scan_concurrency,
            core_assets: config.core_assets().map(str::to_string).collect(),
            active_profile: config.active_profile.clone(),
            ..Self::default()
        })
    }
}

pub(crate) struct LoadedDocument {
    pub(crate) descriptor: Arc<DocumentTypeDescriptor>,
    pub(crate) document: Arc<AssetDocumentInfo>,
    pub(crate) sub_assets: Vec<SubAssetData>,
}

pub(crate) struct Inner {
    catalog: Mutex<Catalog>,
    pub(crate) file_status: FileStatusCache,
    pub(crate) managers: DocumentManagerRegistry,
    pub(crate) backends: HashMap<String, BackendHandle>,
    events: broadcast::Sender<CuratorEvent>,
    pub(crate) wake: Notify,
    options: CuratorOptions,
    update_task: Mutex<Option<UpdateTask>>,
    initialization: Mutex<Option<JoinHandle<Result<()>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    /// Take the curator lock. Never hold the guard across an `.await`.
    pub(crate) fn catalog(&self) -> MutexGuard<'_, Catalog> {
        lock(&self.catalog)
    }

    pub(crate) fn backend(&self, path: &ProjectPath) -> Result<&BackendHandle> {
        let name = path.data_directory();
        match self.backends.get(name) {
            Some(backend) => Ok(backend),
            None => exn::bail!(ErrorKind::UnknownDataDirectory(name.to_string())),
        }
    }

    /// Parse the asset file at `path`, unless an unchanged copy was parsed
    /// before.
    pub(crate) async fn load_document(&self, path: &ProjectPath, info: &FileInfo) -> Result<LoadedDocument> {
        let Some((descriptor, manager)) = self.managers.for_path(path) else {
            exn::bail!(ErrorKind::InvalidDocument(path.to_string()));
        };
        let document = match self.file_status.cached_document(path, info) {
            Some(document) => document,
            None => {
                let bytes = self.backend(path)?.read(path.relative()).await.or_raise(|| ErrorKind::Storage)?;
                let document = Arc::new(manager.parse_document(path, &bytes)?);
                self.file_status.store_document(path, info, document.clone());
                document
            },
        };
        let sub_assets = manager.sub_assets(path, &document);
        Ok(LoadedDocument { descriptor: descriptor.clone(), document, sub_assets })
    }

    async fn register_file(&self, path: &ProjectPath, info: &FileInfo) {
        match self.load_document(path, info).await {
            Ok(loaded) => {
                self.catalog().register_document(path.clone(), loaded.descriptor, loaded.document, loaded.sub_assets);
            },
            Err(e) => {
                tracing::warn!(%path, error = ?e, "could not parse asset");
                let mut catalog = self.catalog();
                if let Some(guid) = catalog.registry.guid_at(path) {
                    catalog.record_failure(guid, (*e).to_string());
                }
            },
        }
    }

    /// Take in the current metadata of the file at `path`. Changed or newly
    /// seen asset files are parsed right away.
    async fn observe_file(&self, path: &ProjectPath, info: &FileInfo) {
        let changed = self.file_status.observe(path, info);
        if self.managers.is_asset_path(path) {
            let exists = {
                let catalog = self.catalog();
                catalog.registry.guid_at(path).and_then(|guid| catalog.registry.get(&guid)).map(|info| info.existence.exists())
            };
            if changed || exists != Some(true) {
                self.register_file(path, info).await;
            }
        }
        if changed {
            self.catalog().invalidate_path(path);
        }
    }

    /// The file at `path` is gone.
    fn forget_file(&self, path: &ProjectPath) {
        self.file_status.remove(path);
        let mut catalog = self.catalog();
        if let Some(guid) = catalog.registry.guid_at(path) {
            catalog.mark_removed(guid);
        }
        catalog.invalidate_path(path);
    }

    /// Re-list `prefix` (or the whole data directory) and reconcile: files
    /// found are observed, anything known below it but no longer listed is
    /// forgotten.
    async fn sync_directory(&self, name: &str, prefix: Option<&Path>) -> Result<()> {
        let Some(backend) = self.backends.get(name) else {
            exn::bail!(ErrorKind::UnknownDataDirectory(name.to_string()));
        };
        let files = backend.list(prefix).await.or_raise(|| ErrorKind::Storage)?;
        let mut present = HashSet::new();
        for info in files {
            let path = match ProjectPath::new(name, &info.path) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(path = %info.path.display(), error = ?e, "skipping file");
                    continue;
                },
            };
            self.observe_file(&path, &info).await;
            present.insert(path);
        }

        let vanished = |path: &ProjectPath| path.is_within(name, prefix) && !present.contains(path);
        let mut gone: BTreeSet<ProjectPath> = self.file_status.paths_where(&vanished).into_iter().collect();
        gone.extend(
            self.catalog()
                .registry
                .assets()
                .filter(|info| info.existence.exists() && vanished(&info.path))
                .map(|info| info.path.clone()),
        );
        // The prefix itself may have been a file that was never observed.
        if let Some(prefix) = prefix
            && let Ok(path) = ProjectPath::new(name, prefix)
            && !present.contains(&path)
        {
            gone.insert(path);
        }
        for path in &gone {
            self.forget_file(path);
        }
        tracing::debug!(data_directory = name, files = present.len(), removed = gone.len(), "synchronized files");
        Ok(())
    }

    async fn load_cache(&self) {
        let Some(path) = &self.options.cache_path else {
            return;
        };
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!(path = %path.display(), "no cache yet, starting empty");
            return;
        }
        let snapshot = match read_cache(path).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = ?e, "ignoring unreadable cache");
                return;
            },
        };
        tracing::info!(
            files = snapshot.files.len(),
            documents = snapshot.documents.len(),
            stamps = snapshot.stamps.len(),
            "loaded cache"
        );
        self.file_status.load(snapshot.files, snapshot.documents);
        self.catalog().ledger.load(snapshot.stamps);
    }

    async fn scan(&self) -> Vec<(ProjectPath, FileInfo)> {
        let mut backends: Vec<_> = self.backends.iter().collect();
        backends.sort_by(|a, b| a.0.cmp(b.0));
        let mut listed = Vec::new();
        for (name, backend) in backends {
            let files = match backend.list(None).await {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(data_directory = %name, error = ?e, "could not list data directory");
                    continue;
                },
            };
            tracing::debug!(data_directory = %name, files = files.len(), "scanned data directory");
            for info in files {
                match ProjectPath::new(name.clone(), &info.path) {
                    Ok(path) => listed.push((path, info)),
                    Err(e) => tracing::warn!(path = %info.path.display(), error = ?e, "skipping file"),
                }
            }
        }
        listed
    }

    #[instrument(skip(self))]
    async fn initialize(&self) -> Result<()> {
        self.load_cache().await;

        let listed = self.scan().await;
        {
            let present: HashSet<&ProjectPath> = listed.iter().map(|(path, _)| path).collect();
            self.file_status.retain(|path| present.contains(path));
        }
        for (path, info) in &listed {
            self.file_status.observe(path, info);
        }

        let assets: Vec<(ProjectPath, FileInfo)> =
            listed.iter().filter(|(path, _)| self.managers.is_asset_path(path)).cloned().collect();
        let mut loaded: Vec<_> = stream::iter(assets)
            .map(|(path, info)| async move {
                let result = self.load_document(&path, &info).await;
                (path, result)
            })
            .buffer_unordered(self.options.scan_concurrency.max(1))
            .collect()
            .await;
        loaded.sort_by(|a, b| a.0.cmp(&b.0));

        {
            let mut catalog = self.catalog();
            let mut seen: HashMap<Guid, ProjectPath> = HashMap::new();
            for (path, result) in loaded {
                let loaded = match result {
                    Ok(loaded) => loaded,
                    Err(e) => {
                        tracing::warn!(%path, error = ?e, "skipping unreadable asset");
                        continue;
                    },
                };
                let guid = loaded.document.guid;
                if let Some(first) = seen.get(&guid) {
                    tracing::warn!(%guid, %path, %first, "GUID already used by another asset, ignoring");
                    continue;
                }
                seen.insert(guid, path.clone());
                catalog.register_document(path, loaded.descriptor, loaded.document, loaded.sub_assets);
            }
            tracing::info!(assets = catalog.registry.guids().len(), files = listed.len(), "initial scan complete");
        }

        self.process_core_assets().await;
        self.catalog().registry.emit_global(CuratorEventKind::AssetListReset);
        Ok(())
    }

    async fn process_core_assets(&self) {
        let (core, profile) = {
            let catalog = self.catalog();
            let core: Vec<Guid> = catalog
                .registry
                .assets()
                .filter(|info| {
                    info.descriptor.flags.core || self.options.core_assets.iter().any(|core| *core == info.path.to_string())
                })
                .map(|info| info.guid)
                .collect();
            (core, catalog.profile.clone())
        };
        for guid in core {
            let state = self.update_asset_transform_state(guid, false, &mut Vec::new()).await;
            if !state.is_some_and(TransformState::needs_work) {
                continue;
            }
            let flags = TransformFlags { background: true, ..TransformFlags::default() };
            let status = self.transform_asset(guid, flags, &profile, &mut Vec::new()).await;
            if !status.is_success() {
                tracing::warn!(%guid, %status, "core asset could not be transformed");
            }
        }
    }
}

async fn read_cache(path: &Path) -> quarry_cache::error::Result<CacheSnapshot> {
    let db = Database::connect(path).await?;
    let snapshot = Repository::from(&db).load().await;
    db.close().await;
    snapshot
}

/// Keeps track of every asset in a project and what it takes to bring each
/// one up to date.
#[derive(Clone)]
pub struct Curator {
    inner: Arc<Inner>,
}

impl Curator {
    /// Set up a curator over `backends`, one per data directory.
    ///
    /// Nothing is scanned until [`start_initialize`](Self::start_initialize)
    /// or [`initialize`](Self::initialize) is called.
    pub fn new(
        options: CuratorOptions,
        backends: impl IntoIterator<Item = BackendHandle>,
        managers: DocumentManagerRegistry,
    ) -> Result<Self> {
        let mut by_name = HashMap::new();
        for backend in backends {
            let name = backend.name().to_string();
            if by_name.insert(name.clone(), backend).is_some() {
                exn::bail!(ErrorKind::DuplicateDataDirectory(name));
            }
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let registry = AssetRegistry::new(events.clone());
        let catalog = Catalog::new(registry, by_name.keys().cloned(), options.active_profile.clone());
        tracing::debug!(data_directories = by_name.len(), managers = ?managers, "created curator");
        Ok(Self {
            inner: Arc::new(Inner {
                catalog: Mutex::new(catalog),
                file_status: FileStatusCache::default(),
                managers,
                backends: by_name,
                events,
                wake: Notify::new(),
                options,
                update_task: Mutex::new(None),
                initialization: Mutex::new(None),
            }),
        })
    }

    /// Load the cache, scan every data directory and process core assets in
    /// the background. See [`wait_for_initialize`](Self::wait_for_initialize).
    pub fn start_initialize(&self) {
        let curator = self.clone();
        let handle = tokio::spawn(async move { curator.initialize().await });
        *lock(&self.inner.initialization) = Some(handle);
    }

    /// Wait for the task started by [`start_initialize`](Self::start_initialize).
    pub async fn wait_for_initialize(&self) -> Result<()> {
        let handle = lock(&self.inner.initialization).take();
        match handle {
            Some(handle) => handle.await.or_raise(|| ErrorKind::Task)?,
            None => Ok(()),
        }
    }

    /// Initialize in the current task.
    pub async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await?;
        if self.inner.options.background_updates {
            self.restart_update_task().await;
        }
        Ok(())
    }

    /// Read access to assets. Holds the curator lock until dropped.
    pub fn lock(&self) -> CuratorGuard<'_> {
        CuratorGuard { catalog: self.inner.catalog() }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CuratorEvent> {
        self.inner.events.subscribe()
    }

    /// A file or folder was added, changed or deleted.
    #[instrument(skip(self, path), fields(%path))]
    pub async fn notify_of_file_change(&self, path: &ProjectPath) -> Result<()> {
        let inner = &self.inner;
        let backend = inner.backend(path)?.clone();
        match backend.stat(path.relative()).await {
            Ok(info) => inner.observe_file(path, &info).await,
            // Not a file (anymore): reconcile everything below it.
            Err(e) if e.is_not_found() => inner.sync_directory(path.data_directory(), Some(path.relative())).await?,
            Err(e) => return Err(e).or_raise(|| ErrorKind::Storage),
        }
        inner.wake.notify_one();
        Ok(())
    }

    /// Re-list every data directory, as after the file system model was
    /// reset. Unchanged files are not parsed or hashed again.
    #[instrument(skip(self))]
    pub async fn rescan(&self) -> Result<()> {
        let mut names: Vec<&String> = self.inner.backends.keys().collect();
        names.sort();
        for name in names {
            self.inner.sync_directory(name, None).await?;
        }
        self.inner.catalog().registry.emit_global(CuratorEventKind::AssetListReset);
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Something about `guid` changed that isn't visible on disk.
    pub fn notify_of_asset_change(&self, guid: Guid) {
        self.inner.catalog().invalidate(guid);
        self.inner.wake.notify_one();
    }

    /// Transform `guid` for `profile` (the active profile if `None`).
    #[instrument(skip(self, flags))]
    pub async fn transform_asset(&self, guid: Guid, flags: TransformFlags, profile: Option<&str>) -> TransformStatus {
        let profile = self.profile_or_active(profile);
        self.inner.transform_asset(guid, flags, &profile, &mut Vec::new()).await
    }

    #[instrument(skip(self, flags))]
    pub async fn transform_all_assets(&self, flags: TransformFlags, profile: Option<&str>) -> TransformSummary {
        let profile = self.profile_or_active(profile);
        self.inner.transform_all_assets(flags, &profile).await
    }

    fn profile_or_active(&self, profile: Option<&str>) -> String {
        match profile {
            Some(profile) => profile.to_string(),
            None => self.active_profile(),
        }
    }

    async fn current_hashes(&self, guid: Guid) -> Option<(u64, u64)> {
        let state = self.inner.update_asset_transform_state(guid, false, &mut Vec::new()).await?;
        if state.is_unusable_dependency() {
            return None;
        }
        let catalog = self.inner.catalog();
        let info = catalog.registry.get(&guid)?;
        Some((info.asset_hash, info.thumb_hash))
    }

    /// Combined hash of the asset and its transform dependencies, or `0` if
    /// it can't be computed.
    pub async fn get_asset_dependency_hash(&self, guid: Guid) -> u64 {
        self.current_hashes(guid).await.map_or(0, |(asset_hash, _)| asset_hash)
    }

    /// Like [`get_asset_dependency_hash`](Self::get_asset_dependency_hash),
    /// but also covering thumbnail dependencies.
    pub async fn get_asset_reference_hash(&self, guid: Guid) -> u64 {
        self.current_hashes(guid).await.map_or(0, |(_, thumb_hash)| thumb_hash)
    }

    /// Re-hash `guid` now if it is stale (or always, with `force`).
    pub async fn update_asset_transform_state(&self, guid: Guid, force: bool) -> Option<TransformState> {
        self.inner.update_asset_transform_state(guid, force, &mut Vec::new()).await
    }

    /// State of `guid` for `profile` (the active profile if `None`), re-hashed
    /// first if it is stale.
    pub async fn transform_state_for(&self, guid: Guid, profile: Option<&str>) -> Option<TransformState> {
        let profile = self.profile_or_active(profile);
        self.inner.update_asset_transform_state(guid, false, &mut Vec::new()).await?;
        self.inner.catalog().state_for_profile(guid, &profile)
    }

    /// Assets depending on `target` through transform or thumbnail
    /// dependencies; directly, or through any chain with `transitive`.
    pub fn find_all_uses(&self, target: &Dependency, transitive: bool) -> BTreeSet<Guid> {
        self.inner.catalog().find_all_uses(target, transitive)
    }

    pub fn generate_transitive_hull(&self, start: &Dependency, kinds: &[DependencyKind]) -> BTreeSet<Dependency> {
        self.inner.catalog().transitive_hull(start, kinds)
    }

    pub fn generate_inverse_transitive_hull(&self, start: &Dependency, kinds: &[DependencyKind]) -> BTreeSet<Guid> {
        self.inner.catalog().inverse_transitive_hull(start, kinds)
    }

    /// Switch profiles. Every asset is invalidated and re-evaluated against
    /// the new profile's transform stamps.
    pub fn set_active_profile(&self, profile: &str) {
        if self.inner.catalog().set_profile(profile) {
            tracing::info!(profile, "active profile changed");
            self.inner.wake.notify_one();
        }
    }

    pub fn active_profile(&self) -> String {
        self.inner.catalog().profile.clone()
    }

    pub fn asset_state_counts(&self) -> BTreeMap<TransformState, usize> {
        self.inner.catalog().state_counts()
    }

    /// Announce sub-assets changed since the last tick. Returns how many.
    pub fn main_thread_tick(&self) -> usize {
        let mut catalog = self.inner.catalog();
        let changed = catalog.registry.take_changed_sub_assets();
        for guid in &changed {
            catalog.registry.emit(*guid, CuratorEventKind::AssetUpdated);
        }
        changed.len()
    }

    /// Drain the stale set in the current task. Returns the number of
    /// assets processed.
    pub async fn process_pending_updates(&self) -> usize {
        let mut processed = 0;
        while self.inner.run_next_update_task().await {
            processed += 1;
        }
        processed
    }

    /// (Re)start the update worker. The stale set is kept.
    pub async fn restart_update_task(&self) {
        self.shutdown_update_task().await;
        let task = UpdateTask::spawn(self.inner.clone());
        *lock(&self.inner.update_task) = Some(task);
    }

    /// Stop the update worker once its current unit of work is done.
    pub async fn shutdown_update_task(&self) {
        let task = lock(&self.inner.update_task).take();
        if let Some(task) = task {
            task.stop().await;
        }
    }

    /// Write file statuses, parsed documents and transform stamps to the
    /// cache file.
    #[instrument(skip(self))]
    pub async fn save_cache(&self) -> Result<()> {
        let Some(path) = &self.inner.options.cache_path else {
            return Ok(());
        };
        if self.inner.options.dry_run {
            tracing::info!(path = %path.display(), "dry run, not saving cache");
            return Ok(());
        }
        let (files, documents) = self.inner.file_status.to_records();
        let stamps = self.inner.catalog().ledger.to_records();
        let snapshot = CacheSnapshot { files, documents, stamps };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Cache)?;
        }
        let db = Database::connect(path).await.or_raise(|| ErrorKind::Cache)?;
        let result = Repository::from(&db).replace_all(&snapshot).await.or_raise(|| ErrorKind::Cache);
        db.close().await;
        result?;
        tracing::info!(
            path = %path.display(),
            files = snapshot.files.len(),
            documents = snapshot.documents.len(),
            stamps = snapshot.stamps.len(),
            "saved cache"
        );
        Ok(())
    }

    /// Stop the update worker and save the cache.
    ///
    /// The worker keeps the curator alive, so this must be called before the
    /// last handle is dropped.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_update_task().await;
        self.save_cache().await
    }
}

/// Read access to the curator's assets while holding the curator lock.
pub struct CuratorGuard<'a> {
    catalog: MutexGuard<'a, Catalog>,
}

impl CuratorGuard<'_> {
    pub fn asset_info(&self, guid: Guid) -> Option<&AssetInfo> {
        self.catalog.registry.get(&guid)
    }

    pub fn asset_at(&self, path: &ProjectPath) -> Option<&AssetInfo> {
        self.catalog.registry.guid_at(path).and_then(|guid| self.catalog.registry.get(&guid))
    }

    pub fn sub_asset(&self, guid: Guid) -> Option<&SubAsset> {
        self.catalog.registry.sub_asset(&guid)
    }

    /// Every known asset GUID, sorted.
    pub fn known_assets(&self) -> Vec<Guid> {
        self.catalog.registry.guids()
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetInfo> {
        self.catalog.registry.assets()
    }

    /// Look up a sub-asset by GUID, by the path of its asset (the main
    /// sub-asset) or by `"<path>|<sub-asset name>"`, and mark it accessed.
    pub fn find_sub_asset(&mut self, query: &str) -> Option<&SubAsset> {
        let guid = match Guid::parse(query) {
            Ok(guid) => guid,
            Err(_) => self.sub_asset_by_path(query)?,
        };
        let sub_asset = self.catalog.registry.sub_asset_mut(&guid)?;
        sub_asset.last_access = Some(UtcDateTime::now());
        Some(&*sub_asset)
    }

    fn sub_asset_by_path(&self, query: &str) -> Option<Guid> {
        let (path, name) = match query.split_once('|') {
            Some((path, name)) => (path, Some(name)),
            None => (query, None),
        };
        let owner = self.catalog.registry.guid_at(&ProjectPath::parse(path).ok()?)?;
        let Some(name) = name else {
            return Some(owner);
        };
        let info = self.catalog.registry.get(&owner)?;
        std::iter::once(owner)
            .chain(info.sub_assets.iter().copied())
            .find(|guid| self.catalog.registry.sub_asset(guid).is_some_and(|sub_asset| sub_asset.data.name == name))
    }

    pub fn active_profile(&self) -> &str {
        &self.catalog.profile
    }

    pub fn state_counts(&self) -> BTreeMap<TransformState, usize> {
        self.catalog.state_counts()
    }
}
