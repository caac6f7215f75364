mod common;

use common::{BROKEN, Project, asset, guid, path, with_type};
use quarry_curator::{
    AssetDocumentInfo, CuratorEventKind, CuratorOptions, Dependency, DependencyKind, ExistenceState, LogLevel,
    SubAssetData, TransformFlags, TransformResult, TransformState,
};
use rstest::rstest;
use std::collections::BTreeSet;
use std::time::Duration;

fn content_hash(bytes: &[u8]) -> u64 {
    let hash = blake3::hash(bytes);
    u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap())
}

#[tokio::test]
async fn test_material_follows_its_texture() {
    let material = guid(1);
    let project = Project::new([
        ("tex.png", b"pixels v1".to_vec()),
        ("mat.qasset", asset(material, 100, &["tex.png"])),
    ])
    .await;
    assert_eq!(project.state(material), TransformState::Unknown);

    project.settle().await;
    let (first_hash, _, state) = project.snapshot(material);
    assert_eq!(first_hash, 100u64.wrapping_add(content_hash(b"pixels v1")));
    assert_eq!(state, TransformState::NeedsTransform);

    let status = project.curator.transform_asset(material, TransformFlags::default(), None).await;
    assert!(status.is_success(), "{status}");
    assert_eq!(project.state(material), TransformState::UpToDate);

    project.write("tex.png", b"pixels v2").await;
    assert_eq!(project.state(material), TransformState::Unknown);
    project.settle().await;
    let (second_hash, _, state) = project.snapshot(material);
    assert_ne!(second_hash, first_hash);
    assert_eq!(state, TransformState::NeedsTransform);

    let status = project.curator.transform_asset(material, TransformFlags::default(), None).await;
    assert!(status.is_success(), "{status}");
    assert_eq!(project.state(material), TransformState::UpToDate);
    assert_eq!(project.manager.processed_guids(), vec![material, material]);
}

#[tokio::test]
async fn test_hashing_is_idempotent() {
    let (a, b) = (guid(1), guid(2));
    let project = Project::new([
        ("leaf.txt", b"leaf".to_vec()),
        ("a.qasset", asset(a, 1, &["b.qasset"])),
        ("b.qasset", asset(b, 2, &["leaf.txt"])),
    ])
    .await;
    project.settle().await;
    let first = (project.snapshot(a), project.snapshot(b));

    project.curator.update_asset_transform_state(a, true).await;
    project.curator.update_asset_transform_state(b, true).await;
    assert_eq!((project.snapshot(a), project.snapshot(b)), first);
    assert_eq!(project.curator.get_asset_dependency_hash(a).await, first.0.0);
    assert_eq!(project.curator.get_asset_dependency_hash(a).await, first.0.0);
}

#[tokio::test]
async fn test_discovery_order_does_not_change_hashes() {
    let (a, b) = (guid(1), guid(2));
    let a_bytes = asset(a, 10, &["b.qasset"]);
    let b_bytes = asset(b, 20, &["leaf.txt"]);

    let a_first = Project::new([("leaf.txt", b"leaf".to_vec()), ("a.qasset", a_bytes.clone())]).await;
    a_first.settle().await;
    a_first.write("b.qasset", &b_bytes).await;
    a_first.settle().await;

    let b_first = Project::new([("leaf.txt", b"leaf".to_vec()), ("b.qasset", b_bytes.clone())]).await;
    b_first.settle().await;
    b_first.write("a.qasset", &a_bytes).await;
    b_first.settle().await;

    assert_eq!(a_first.snapshot(a), b_first.snapshot(a));
    assert_eq!(a_first.snapshot(b), b_first.snapshot(b));

    // Reprocessing in the opposite order within one project.
    let before = (a_first.snapshot(a), a_first.snapshot(b));
    a_first.curator.notify_of_asset_change(b);
    a_first.curator.update_asset_transform_state(b, false).await;
    a_first.curator.update_asset_transform_state(a, false).await;
    assert_eq!((a_first.snapshot(a), a_first.snapshot(b)), before);
}

#[tokio::test]
async fn test_cycle_marks_every_member() {
    let (a, b, c) = (guid(1), guid(2), guid(3));
    let project = Project::new([
        ("a.qasset", asset(a, 1, &["b.qasset"])),
        ("b.qasset", asset(b, 2, &["c.qasset"])),
        ("c.qasset", asset(c, 3, &["a.qasset"])),
    ])
    .await;
    assert_eq!(project.curator.update_asset_transform_state(a, false).await, Some(TransformState::CircularDependency));
    project.settle().await;
    for member in [a, b, c] {
        assert_eq!(project.state(member), TransformState::CircularDependency);
        let lock = project.curator.lock();
        let info = lock.asset_info(member).unwrap();
        assert_eq!(info.circular_dependencies, BTreeSet::from([a, b, c]));
        assert!(info.log.iter().any(|entry| entry.level == LogLevel::Error));
    }
    assert_eq!(project.curator.get_asset_dependency_hash(a).await, 0);
    let status = project.curator.transform_asset(b, TransformFlags::default(), None).await;
    assert_eq!(status.result, TransformResult::Failure);

    // Breaking the cycle recovers every member.
    project.write("c.qasset", &asset(c, 3, &[])).await;
    project.settle().await;
    for member in [a, b, c] {
        assert_eq!(project.state(member), TransformState::NeedsTransform);
        assert!(project.curator.lock().asset_info(member).unwrap().circular_dependencies.is_empty());
    }
}

#[tokio::test]
async fn test_missing_dependency_heals_when_created() {
    let (a, x) = (guid(1), guid(2));
    let project = Project::new([("a.qasset", asset(a, 1, &["x.qasset"]))]).await;
    project.settle().await;
    assert_eq!(project.state(a), TransformState::MissingTransformDependency);
    {
        let lock = project.curator.lock();
        let info = lock.asset_info(a).unwrap();
        assert_eq!(info.missing_transform_deps, BTreeSet::from(["x.qasset".to_string()]));
        assert_eq!(info.asset_hash, 0);
    }

    project.write("x.qasset", &asset(x, 5, &[])).await;
    assert_eq!(project.state(a), TransformState::Unknown);
    project.settle().await;
    assert_eq!(project.state(a), TransformState::NeedsTransform);
    assert!(project.curator.lock().asset_info(a).unwrap().missing_transform_deps.is_empty());
}

#[tokio::test]
async fn test_guid_reference_resolves_once_asset_appears() {
    let (a, x) = (guid(1), guid(2));
    let project = Project::new([("a.qasset", asset(a, 1, &[&x.to_string()]))]).await;
    project.settle().await;
    assert_eq!(project.state(a), TransformState::MissingTransformDependency);

    project.write("Nested/x.qasset", &asset(x, 5, &[])).await;
    project.settle().await;
    assert_eq!(project.state(a), TransformState::NeedsTransform);
    assert_eq!(project.snapshot(a).0, 1 + project.snapshot(x).0);
}

#[tokio::test]
async fn test_leaf_change_propagates_to_ancestors_only() {
    let (a, b, unrelated) = (guid(1), guid(2), guid(3));
    let project = Project::new([
        ("leaf.txt", b"leaf v1".to_vec()),
        ("other.txt", b"other".to_vec()),
        ("a.qasset", asset(a, 1, &["b.qasset"])),
        ("b.qasset", asset(b, 2, &["leaf.txt"])),
        ("u.qasset", asset(unrelated, 3, &["other.txt"])),
    ])
    .await;
    project.settle().await;
    let before = [a, b, unrelated].map(|guid| project.snapshot(guid).0);

    project.write("leaf.txt", b"leaf v2").await;
    project.settle().await;
    let after = [a, b, unrelated].map(|guid| project.snapshot(guid).0);
    assert_ne!(after[0], before[0]);
    assert_ne!(after[1], before[1]);
    assert_eq!(after[2], before[2]);
}

#[tokio::test]
async fn test_deleted_asset_is_purged_on_next_pass() {
    let scene = guid(1);
    let mesh = guid(10);
    let mut document = AssetDocumentInfo::new(scene, "Scene");
    document.sub_assets = vec![SubAssetData { guid: mesh, name: "Mesh".into(), asset_type: "Mesh".into(), icon: None }];
    let project = Project::new([("scene.qasset", serde_json::to_vec(&document).unwrap())]).await;
    project.settle().await;
    assert!(project.curator.lock().sub_asset(mesh).is_some());
    let mut events = project.curator.subscribe();

    project.delete("scene.qasset").await;
    assert_eq!(project.curator.lock().asset_info(scene).unwrap().existence, ExistenceState::FileRemoved);
    project.settle().await;
    {
        let lock = project.curator.lock();
        assert!(lock.asset_info(scene).is_none());
        assert!(lock.sub_asset(scene).is_none());
        assert!(lock.sub_asset(mesh).is_none());
    }
    let mut removed = false;
    while let Ok(event) = events.try_recv() {
        removed |= event.guid == Some(scene) && event.kind == CuratorEventKind::AssetRemoved;
    }
    assert!(removed);
}

#[tokio::test]
async fn test_removed_folder_forgets_everything_below_it() {
    let (a, b, user) = (guid(1), guid(2), guid(3));
    let project = Project::new([
        ("Sub/a.qasset", asset(a, 1, &[])),
        ("Sub/tex.png", b"red".to_vec()),
        ("Subway/b.qasset", asset(b, 1, &[])),
        ("user.qasset", asset(user, 5, &["Sub/tex.png"])),
    ])
    .await;
    project.settle().await;

    project.remove("Sub/a.qasset").await;
    project.remove("Sub/tex.png").await;
    project.notify("Sub").await;
    assert_eq!(project.curator.lock().asset_info(a).unwrap().existence, ExistenceState::FileRemoved);
    project.settle().await;

    let lock = project.curator.lock();
    assert!(lock.asset_info(a).is_none());
    assert!(lock.asset_info(b).unwrap().existence.exists());
    assert_eq!(lock.asset_info(user).unwrap().transform_state, TransformState::MissingTransformDependency);
}

#[tokio::test]
async fn test_added_folder_is_discovered() {
    let (b, user) = (guid(2), guid(3));
    let project = Project::new([("user.qasset", asset(user, 5, &[&b.to_string(), "Sub/Deep/tex.png"]))]).await;
    project.settle().await;
    assert_eq!(project.state(user), TransformState::MissingTransformDependency);

    project.put("Sub/b.qasset", &asset(b, 1, &[])).await;
    project.put("Sub/Deep/tex.png", b"red").await;
    project.notify("Sub").await;
    assert!(project.curator.lock().asset_info(b).is_some());
    project.settle().await;

    assert_eq!(project.state(b), TransformState::NeedsTransform);
    assert_eq!(project.state(user), TransformState::NeedsTransform);
}

#[tokio::test]
async fn test_rescan_reconciles_with_disk() {
    let (a, b, c) = (guid(1), guid(2), guid(3));
    let project = Project::new([("a.qasset", asset(a, 1, &[])), ("b.qasset", asset(b, 1, &[]))]).await;
    project.settle().await;
    let before = project.snapshot(b);
    let mut events = project.curator.subscribe();

    project.remove("a.qasset").await;
    project.put("Late/c.qasset", &asset(c, 1, &[])).await;
    project.curator.rescan().await.unwrap();
    project.settle().await;

    {
        let lock = project.curator.lock();
        assert!(lock.asset_info(a).is_none());
        assert!(lock.asset_info(c).is_some());
        assert_eq!(lock.known_assets(), vec![b, c]);
    }
    assert_eq!(project.snapshot(b), before);
    let mut reset = false;
    while let Ok(event) = events.try_recv() {
        reset |= event.kind == CuratorEventKind::AssetListReset;
    }
    assert!(reset);
}

#[tokio::test]
async fn test_recreated_asset_is_updated_in_place() {
    let a = guid(1);
    let project = Project::new([("a.qasset", asset(a, 1, &[]))]).await;
    project.settle().await;
    let mut events = project.curator.subscribe();

    project.delete("a.qasset").await;
    project.write("a.qasset", &asset(a, 2, &[])).await;
    project.settle().await;

    let lock = project.curator.lock();
    let info = lock.asset_info(a).unwrap();
    assert!(info.existence.exists());
    assert_eq!(info.asset_hash, 2);
    drop(lock);
    while let Ok(event) = events.try_recv() {
        assert_ne!(event.kind, CuratorEventKind::AssetAdded);
        assert_ne!(event.kind, CuratorEventKind::AssetRemoved);
    }
}

#[tokio::test]
async fn test_new_guid_at_known_path_replaces_asset() {
    let (old, new) = (guid(1), guid(2));
    let project = Project::new([("a.qasset", asset(old, 1, &[]))]).await;
    project.settle().await;

    project.write("a.qasset", &asset(new, 1, &[])).await;
    let lock = project.curator.lock();
    assert!(lock.asset_info(old).is_none());
    assert_eq!(lock.asset_at(&path("Base/a.qasset")).map(|info| info.guid), Some(new));
}

#[tokio::test]
async fn test_moved_asset_keeps_its_guid() {
    let (a, user) = (guid(1), guid(2));
    let project = Project::new([
        ("a.qasset", asset(a, 1, &[])),
        ("user.qasset", asset(user, 5, &[&a.to_string()])),
    ])
    .await;
    project.settle().await;
    let mut events = project.curator.subscribe();

    project.delete("a.qasset").await;
    project.write("Moved/a.qasset", &asset(a, 1, &[])).await;
    project.settle().await;

    let lock = project.curator.lock();
    assert_eq!(lock.asset_info(a).unwrap().path, path("Base/Moved/a.qasset"));
    assert_eq!(lock.asset_info(user).unwrap().transform_state, TransformState::NeedsTransform);
    drop(lock);
    let mut moved = false;
    while let Ok(event) = events.try_recv() {
        moved |= event.guid == Some(a) && event.kind == CuratorEventKind::AssetMoved;
    }
    assert!(moved);
}

#[tokio::test]
async fn test_transform_brings_dependencies_up_to_date_first() {
    let (a, b) = (guid(1), guid(2));
    let project = Project::new([("a.qasset", asset(a, 1, &["b.qasset"])), ("b.qasset", asset(b, 2, &[]))]).await;

    let status = project.curator.transform_asset(a, TransformFlags::default(), None).await;
    assert!(status.is_success(), "{status}");
    assert_eq!(project.manager.processed_guids(), vec![b, a]);
    assert_eq!(project.state(a), TransformState::UpToDate);
    assert_eq!(project.state(b), TransformState::UpToDate);

    // Nothing left to do.
    let summary = project.curator.transform_all_assets(TransformFlags::default(), None).await;
    assert_eq!((summary.transformed, summary.skipped), (0, 2));
    let summary = project.curator.transform_all_assets(TransformFlags::forced(), None).await;
    assert_eq!(summary.transformed, 2);
}

#[tokio::test]
async fn test_failed_transform_is_not_retried_until_inputs_change() {
    let broken = guid(1);
    let project = Project::new([("broken.qasset", with_type(asset(broken, 1, &[]), BROKEN))]).await;

    let status = project.curator.transform_asset(broken, TransformFlags::default(), None).await;
    assert_eq!(status.result, TransformResult::Failure);
    assert_eq!(project.state(broken), TransformState::TransformError);
    assert!(project.curator.lock().asset_info(broken).unwrap().log.iter().any(|entry| entry.level == LogLevel::Error));

    let summary = project.curator.transform_all_assets(TransformFlags::default(), None).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].0, broken);

    project.write("broken.qasset", &asset(broken, 2, &[])).await;
    project.settle().await;
    assert_eq!(project.state(broken), TransformState::NeedsTransform);
}

#[tokio::test]
async fn test_failed_dependency_fails_dependent() {
    let (a, broken) = (guid(1), guid(2));
    let project = Project::new([
        ("a.qasset", asset(a, 1, &["broken.qasset"])),
        ("broken.qasset", with_type(asset(broken, 2, &[]), BROKEN)),
    ])
    .await;
    let status = project.curator.transform_asset(a, TransformFlags::default(), None).await;
    assert_eq!(status.result, TransformResult::Failure);
    assert!(project.manager.processed_guids().is_empty());
}

#[tokio::test]
async fn test_needs_import() {
    let a = guid(1);
    let mut document = AssetDocumentInfo::new(a, "Mesh");
    document.needs_import = true;
    let project = Project::new([("a.qasset", serde_json::to_vec(&document).unwrap())]).await;
    project.settle().await;
    assert_eq!(project.state(a), TransformState::NeedsImport);
    let status = project.curator.transform_asset(a, TransformFlags::default(), None).await;
    assert_eq!(status.result, TransformResult::NeedsImport);
}

#[tokio::test]
async fn test_thumbnail_follows_thumbnail_dependencies() {
    let preview = guid(1);
    let mut document = AssetDocumentInfo::new(preview, "Material");
    document.settings_hash = 7;
    document.thumbnail_dependencies = BTreeSet::from(["backdrop.png".to_string()]);
    let project = Project::new([
        ("backdrop.png", b"sky".to_vec()),
        ("preview.qthumb", serde_json::to_vec(&document).unwrap()),
    ])
    .await;
    let status = project.curator.transform_asset(preview, TransformFlags::default(), None).await;
    assert!(status.is_success(), "{status}");
    assert_eq!(project.manager.thumbnails(), vec![preview]);
    assert_eq!(project.state(preview), TransformState::UpToDate);

    // Only the thumbnail hash moves.
    let (asset_hash, thumb_hash, _) = project.snapshot(preview);
    project.write("backdrop.png", b"sunset").await;
    project.settle().await;
    let (new_asset_hash, new_thumb_hash, state) = project.snapshot(preview);
    assert_eq!(new_asset_hash, asset_hash);
    assert_ne!(new_thumb_hash, thumb_hash);
    assert_eq!(state, TransformState::NeedsThumbnail);

    project.curator.transform_asset(preview, TransformFlags::default(), None).await;
    assert_eq!(project.manager.processed_guids(), vec![preview]);
    assert_eq!(project.manager.thumbnails(), vec![preview, preview]);
    assert_eq!(project.state(preview), TransformState::UpToDate);

    project.delete("backdrop.png").await;
    project.settle().await;
    assert_eq!(project.state(preview), TransformState::MissingThumbnailDependency);
    assert_eq!(project.curator.get_asset_reference_hash(preview).await, 0);
    assert_eq!(asset_hash, 7);
    assert_eq!(project.curator.get_asset_dependency_hash(preview).await, asset_hash);
}

#[tokio::test]
async fn test_profiles_have_separate_stamps() {
    let a = guid(1);
    let project = Project::new([("a.qasset", asset(a, 1, &[]))]).await;
    project.curator.transform_all_assets(TransformFlags::default(), None).await;
    assert_eq!(project.state(a), TransformState::UpToDate);

    let mut events = project.curator.subscribe();
    project.curator.set_active_profile("mobile");
    assert_eq!(events.try_recv().unwrap().kind, CuratorEventKind::ActivePlatformChanged);
    assert_eq!(project.state(a), TransformState::Unknown);
    project.settle().await;
    assert_eq!(project.state(a), TransformState::NeedsTransform);
    let counts = project.curator.asset_state_counts();
    assert_eq!(counts.get(&TransformState::NeedsTransform), Some(&1));

    let summary = project.curator.transform_all_assets(TransformFlags::default(), None).await;
    assert_eq!(summary.transformed, 1);
    assert_eq!(project.manager.processed()[1].1, "mobile");

    project.curator.set_active_profile("default");
    project.settle().await;
    assert_eq!(project.state(a), TransformState::UpToDate);
}

#[tokio::test]
async fn test_transform_for_inactive_profile() {
    let a = guid(1);
    let project = Project::new([("a.qasset", asset(a, 1, &[]))]).await;
    let status = project.curator.transform_asset(a, TransformFlags::default(), Some("console")).await;
    assert!(status.is_success(), "{status}");
    assert_eq!(project.manager.processed()[0].1, "console");
    // The active profile still has no output.
    assert_eq!(project.state(a), TransformState::NeedsTransform);
    assert_eq!(project.curator.transform_state_for(a, Some("console")).await, Some(TransformState::UpToDate));
    assert_eq!(project.curator.transform_state_for(a, None).await, Some(TransformState::NeedsTransform));
    let lock = project.curator.lock();
    let log = &lock.asset_info(a).unwrap().log;
    assert!(log.iter().any(|entry| entry.level == LogLevel::Info && entry.message == "transformed for console"));
}

#[tokio::test]
async fn test_uses_and_hulls() {
    let (a, b, c) = (guid(1), guid(2), guid(3));
    let mut package = AssetDocumentInfo::new(c, "Collection");
    package.package_dependencies = BTreeSet::from(["a.qasset".to_string()]);
    let project = Project::new([
        ("leaf.txt", b"leaf".to_vec()),
        ("a.qasset", asset(a, 1, &["b.qasset"])),
        ("b.qasset", asset(b, 2, &["leaf.txt"])),
        ("c.qasset", serde_json::to_vec(&package).unwrap()),
    ])
    .await;
    let leaf = Dependency::File(path("Base/leaf.txt"));

    assert_eq!(project.curator.find_all_uses(&leaf, false), BTreeSet::from([b]));
    assert_eq!(project.curator.find_all_uses(&leaf, true), BTreeSet::from([a, b]));
    assert_eq!(
        project.curator.generate_transitive_hull(&Dependency::Asset(a), &[DependencyKind::Transform]),
        BTreeSet::from([Dependency::Asset(b), leaf.clone()])
    );
    // Package dependencies only show up when asked for.
    assert_eq!(project.curator.generate_inverse_transitive_hull(&leaf, &DependencyKind::ALL), BTreeSet::from([a, b, c]));
    assert_eq!(project.curator.generate_inverse_transitive_hull(&leaf, &DependencyKind::HASHED), BTreeSet::from([a, b]));
}

#[rstest]
#[case("Base/scene.qasset", 1)]
#[case("Base/scene.qasset|Mesh", 10)]
#[case("00000000-0000-0000-0000-00000000000a", 10)]
#[tokio::test]
async fn test_find_sub_asset(#[case] query: &str, #[case] expected: u128) {
    let scene = guid(1);
    let mut document = AssetDocumentInfo::new(scene, "Scene");
    document.sub_assets =
        vec![SubAssetData { guid: guid(10), name: "Mesh".into(), asset_type: "Mesh".into(), icon: None }];
    let project = Project::new([("scene.qasset", serde_json::to_vec(&document).unwrap())]).await;

    let mut lock = project.curator.lock();
    let sub_asset = lock.find_sub_asset(query).unwrap();
    assert_eq!(sub_asset.data.guid, guid(expected));
    assert_eq!(sub_asset.owner, scene);
    assert!(sub_asset.last_access.is_some());
    assert!(lock.find_sub_asset("Base/scene.qasset|Missing").is_none());
}

#[tokio::test]
async fn test_sub_asset_changes_are_batched_per_tick() {
    let scene = guid(1);
    let sub_asset = |name: &str| SubAssetData { guid: guid(10), name: name.into(), asset_type: "Mesh".into(), icon: None };
    let mut document = AssetDocumentInfo::new(scene, "Scene");
    document.sub_assets = vec![sub_asset("Mesh")];
    let project = Project::new([("scene.qasset", serde_json::to_vec(&document).unwrap())]).await;
    assert_eq!(project.curator.main_thread_tick(), 1);
    assert_eq!(project.curator.main_thread_tick(), 0);

    document.sub_assets = vec![sub_asset("Renamed")];
    project.write("scene.qasset", &serde_json::to_vec(&document).unwrap()).await;
    let mut events = project.curator.subscribe();
    assert_eq!(project.curator.main_thread_tick(), 1);
    let event = events.try_recv().unwrap();
    assert_eq!((event.guid, event.kind), (Some(guid(10)), CuratorEventKind::AssetUpdated));
}

#[tokio::test]
async fn test_core_assets_are_transformed_during_initialization() {
    let (core, other) = (guid(1), guid(2));
    let options = CuratorOptions {
        background_updates: false,
        core_assets: vec!["Base/core.qasset".to_string()],
        ..CuratorOptions::default()
    };
    let project =
        Project::with_options([("core.qasset", asset(core, 1, &[])), ("other.qasset", asset(other, 2, &[]))], options)
            .await;
    assert_eq!(project.manager.processed_guids(), vec![core]);
    assert_eq!(project.state(core), TransformState::UpToDate);
}

#[tokio::test]
async fn test_cache_round_trip_skips_finished_work() {
    let dir = tempfile::tempdir().unwrap();
    let options = CuratorOptions {
        background_updates: false,
        cache_path: Some(dir.path().join("nested").join("curator.sqlite")),
        ..CuratorOptions::default()
    };
    let a = guid(1);
    let files = || [("leaf.txt", b"leaf".to_vec()), ("a.qasset", asset(a, 1, &["leaf.txt"]))];

    let first = Project::with_options(files(), options.clone()).await;
    first.curator.transform_all_assets(TransformFlags::default(), None).await;
    first.curator.shutdown().await.unwrap();

    let second = Project::with_options(files(), options).await;
    second.settle().await;
    assert_eq!(second.state(a), TransformState::UpToDate);
    assert!(second.manager.processed().is_empty());
}

#[tokio::test]
async fn test_unreadable_cache_degrades_to_full_rehash() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("curator.sqlite");
    std::fs::write(&cache_path, b"definitely not sqlite").unwrap();
    let options = CuratorOptions { background_updates: false, cache_path: Some(cache_path), ..CuratorOptions::default() };
    let a = guid(1);
    let project = Project::with_options([("a.qasset", asset(a, 1, &[]))], options).await;
    project.settle().await;
    assert_eq!(project.state(a), TransformState::NeedsTransform);
}

#[tokio::test]
async fn test_unparseable_asset_is_skipped() {
    let a = guid(1);
    let project = Project::new([("a.qasset", asset(a, 1, &[])), ("junk.qasset", b"{ not json".to_vec())]).await;
    assert_eq!(project.curator.lock().known_assets(), vec![a]);
}

#[tokio::test]
async fn test_update_worker_processes_changes_in_background() {
    let a = guid(1);
    let options = CuratorOptions::default();
    let project =
        Project::with_options([("leaf.txt", b"v1".to_vec()), ("a.qasset", asset(a, 1, &["leaf.txt"]))], options).await;

    let settled = async {
        while project.state(a) == TransformState::Unknown {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), settled).await.unwrap();
    let before = project.snapshot(a).0;

    project.write("leaf.txt", b"v2").await;
    let changed = async {
        while project.state(a) == TransformState::Unknown || project.snapshot(a).0 == before {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), changed).await.unwrap();
    project.curator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_and_wait_for_initialize() {
    let backend = std::sync::Arc::new(
        quarry_storage::backend::MockBackend::with_files([("a.qasset", asset(guid(1), 1, &[]))]).with_name("Base"),
    );
    let managers =
        quarry_curator::DocumentManagerRegistry::new().with(std::sync::Arc::new(common::TestAssets::default())).unwrap();
    let options = CuratorOptions { background_updates: false, ..CuratorOptions::default() };
    let handle: quarry_storage::BackendHandle = backend;
    let curator = quarry_curator::Curator::new(options, [handle], managers).unwrap();
    let mut events = curator.subscribe();
    curator.start_initialize();
    curator.wait_for_initialize().await.unwrap();
    assert_eq!(curator.lock().known_assets(), vec![guid(1)]);

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    assert!(kinds.contains(&CuratorEventKind::AssetAdded));
    assert_eq!(kinds.last(), Some(&CuratorEventKind::AssetListReset));
}
