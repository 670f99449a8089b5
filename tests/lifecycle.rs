//! Version lifecycle tests: numbering, creation, the save path, cloning
//! and the scan-import flow end to end.

use std::sync::Arc;

use floorplan_kernel::importer::{ScannedRoom, ScannedWall, WallDimensions};
use floorplan_kernel::store::InMemoryStore;
use floorplan_kernel::{
    import_scan, ArticleInput, ArticlePayload, DesiredGraph, PointInput, Project, ProjectId,
    Store, StoreTx, Vec3, VersionManager, WallInput,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn setup() -> (Arc<InMemoryStore>, VersionManager<InMemoryStore>, ProjectId) {
    let store = Arc::new(InMemoryStore::new());
    let project = Project::new("owner-1", "house");
    let project_id = project.id;
    store.add_project(project);
    let manager = VersionManager::new(Arc::clone(&store));
    (store, manager, project_id)
}

fn small_graph() -> DesiredGraph {
    DesiredGraph {
        points: vec![
            PointInput::at("p-1", 0.0, 0.0, 0.0),
            PointInput::at("p-2", 3.0, 0.0, 0.0),
        ],
        walls: vec![WallInput::between("w-1", "p-1", "p-2")],
        articles: vec![ArticleInput::new(
            "door-1",
            ArticlePayload {
                position: Vec3::new(1.5, 0.0, 0.0),
                wall_id: Some("w-1".to_string()),
                reference_point_id: Some("p-1".to_string()),
                ..Default::default()
            },
        )],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NUMBERING AND CREATION
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_version_is_1_0() {
    let (_, manager, project_id) = setup();
    let version = manager
        .create_version(project_id, &small_graph(), "owner-1")
        .await
        .unwrap();
    assert_eq!(version.number.to_string(), "1.0");
    assert_eq!(version.created_by, "owner-1");
}

#[tokio::test]
async fn test_version_numbers_advance_by_minor() {
    let (_, manager, project_id) = setup();
    let empty = DesiredGraph::default();
    for expected in ["1.0", "1.1", "1.2"] {
        let version = manager
            .create_version(project_id, &empty, "owner-1")
            .await
            .unwrap();
        assert_eq!(version.number.to_string(), expected);
    }
}

#[tokio::test]
async fn test_create_version_persists_the_graph() {
    let (store, manager, project_id) = setup();
    let version = manager
        .create_version(project_id, &small_graph(), "owner-1")
        .await
        .unwrap();
    assert_eq!(store.point_count(version.id), 2);
    assert_eq!(store.wall_count(version.id), 1);
    assert_eq!(store.article_count(version.id), 1);
}

#[tokio::test]
async fn test_create_version_for_unknown_project_fails() {
    let (_, manager, _) = setup();
    let err = manager
        .create_version(ProjectId::new(), &small_graph(), "owner-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found_error");
}

#[tokio::test]
async fn test_failed_create_persists_no_version_row() {
    let (store, manager, project_id) = setup();
    // Dangling wall reference makes reconciliation fail after the version
    // row was staged; rollback must discard the row too.
    let desired = DesiredGraph {
        points: vec![],
        walls: vec![WallInput::between("w-1", "p-missing", "p-missing-too")],
        articles: vec![],
    };
    assert!(manager
        .create_version(project_id, &desired, "owner-1")
        .await
        .is_err());

    let mut tx = store.begin().await.unwrap();
    assert!(tx.latest_version(project_id).await.unwrap().is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// THE SAVE PATH
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_version_reconciles_and_touches() {
    let (store, manager, project_id) = setup();
    let version = manager
        .create_version(project_id, &small_graph(), "owner-1")
        .await
        .unwrap();

    let mut desired = small_graph();
    desired.articles.clear();
    let result = manager.update_version(version.id, &desired).await.unwrap();
    assert_eq!(result.articles.deleted, 1);
    assert_eq!(store.article_count(version.id), 0);

    let mut tx = store.begin().await.unwrap();
    let reloaded = tx.version(version.id).await.unwrap().unwrap();
    assert!(reloaded.last_modified > version.last_modified);
}

#[tokio::test]
async fn test_update_unknown_version_fails() {
    let (_, manager, _) = setup();
    let err = manager
        .update_version(floorplan_kernel::VersionId::new(), &DesiredGraph::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found_error");
}

// ─────────────────────────────────────────────────────────────────────────────
// CLONING
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_clone_preserves_client_ids_and_fields() {
    let (_, manager, project_id) = setup();
    let source = manager
        .create_version(project_id, &small_graph(), "owner-1")
        .await
        .unwrap();

    let clone = manager.clone_version(source.id).await.unwrap();
    assert_eq!(clone.number.to_string(), "1.1");
    assert_eq!(clone.created_by, source.created_by);

    let original = manager.snapshot(source.id).await.unwrap();
    let copied = manager.snapshot(clone.id).await.unwrap();

    assert_eq!(original.num_points(), copied.num_points());
    assert_eq!(original.num_walls(), copied.num_walls());
    assert_eq!(original.num_articles(), copied.num_articles());

    for point in &original.points {
        let twin = copied.point(&point.client_id).unwrap();
        assert_eq!((twin.x, twin.y, twin.z), (point.x, point.y, point.z));
    }
    let wall = copied.wall("w-1").unwrap();
    assert_eq!(wall.thickness, original.wall("w-1").unwrap().thickness);
}

#[tokio::test]
async fn test_clone_assigns_fresh_persisted_ids() {
    let (_, manager, project_id) = setup();
    let source = manager
        .create_version(project_id, &small_graph(), "owner-1")
        .await
        .unwrap();
    let clone = manager.clone_version(source.id).await.unwrap();

    let original = manager.snapshot(source.id).await.unwrap();
    let copied = manager.snapshot(clone.id).await.unwrap();

    for point in &original.points {
        let twin = copied.point(&point.client_id).unwrap();
        assert_ne!(twin.persisted_id, point.persisted_id);
    }

    // References are rewritten against the clone's own rows.
    let wall = copied.wall("w-1").unwrap();
    assert_eq!(wall.start_point_id, copied.point("p-1").unwrap().persisted_id);
    let door = copied.article("door-1").unwrap();
    assert_eq!(door.wall_id, Some(wall.persisted_id));
    assert_eq!(
        door.reference_point_id,
        Some(copied.point("p-1").unwrap().persisted_id)
    );
}

#[tokio::test]
async fn test_clone_leaves_source_untouched() {
    let (store, manager, project_id) = setup();
    let source = manager
        .create_version(project_id, &small_graph(), "owner-1")
        .await
        .unwrap();
    let before = manager.snapshot(source.id).await.unwrap();

    manager.clone_version(source.id).await.unwrap();

    let after = manager.snapshot(source.id).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(store.point_count(source.id), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// SCAN IMPORT END TO END
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_imported_room_persists_after_adoption() {
    let (store, manager, project_id) = setup();

    let identity = vec![
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];
    let mut translated = identity.clone();
    translated[12] = 2.0;
    let room = ScannedRoom {
        walls: vec![
            ScannedWall {
                transform: identity,
                dimensions: Some(WallDimensions {
                    length: 2.0,
                    height: 2.5,
                    thickness: 0.2,
                }),
            },
            ScannedWall {
                transform: translated,
                dimensions: Some(WallDimensions {
                    length: 3.0,
                    height: 2.5,
                    thickness: 0.2,
                }),
            },
        ],
        doors: vec![],
    };

    let desired = import_scan(&room).unwrap().adopt_ids_as_client_ids();
    let version = manager
        .create_version(project_id, &desired, "owner-1")
        .await
        .unwrap();

    // Shared corner deduplicated: 3 points, 2 walls, all references resolved.
    assert_eq!(store.point_count(version.id), 3);
    assert_eq!(store.wall_count(version.id), 2);

    let snapshot = manager.snapshot(version.id).await.unwrap();
    let shared = snapshot.point("2").unwrap();
    assert_eq!(snapshot.wall("1").unwrap().end_point_id, shared.persisted_id);
    assert_eq!(snapshot.wall("2").unwrap().start_point_id, shared.persisted_id);
}

// ─────────────────────────────────────────────────────────────────────────────
// PROJECT DELETION
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_project_removes_versions_and_graphs() {
    let (store, manager, project_id) = setup();
    let version = manager
        .create_version(project_id, &small_graph(), "owner-1")
        .await
        .unwrap();

    manager.delete_project(project_id).await.unwrap();

    assert_eq!(store.point_count(version.id), 0);
    let err = manager.snapshot(version.id).await.unwrap_err();
    assert_eq!(err.kind(), "not_found_error");
}
