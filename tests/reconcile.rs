//! Reconciliation tests: idempotence, orphan deletion, reference
//! resolution and transactional rollback against the in-memory store.

use std::collections::BTreeMap;

use floorplan_kernel::reconcile::{load_graph, reconcile};
use floorplan_kernel::store::InMemoryStore;
use floorplan_kernel::{
    ArticleInput, ArticlePayload, DesiredGraph, PointInput, Project, ProjectId, Store, StoreTx,
    Vec3, Version, VersionId, VersionNumber, WallInput,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn seed_version(store: &InMemoryStore) -> (ProjectId, VersionId) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let project = Project::new("owner-1", "house");
    let project_id = project.id;
    store.add_project(project);
    let version = Version::new(project_id, VersionNumber::first(), "owner-1");
    let version_id = version.id;
    store.add_version(version);
    (project_id, version_id)
}

/// Two points, one wall between them, one door on the wall.
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
                ..Default::default()
            },
        )],
    }
}

async fn apply(store: &InMemoryStore, version_id: VersionId, desired: &DesiredGraph) {
    let mut tx = store.begin().await.unwrap();
    reconcile(&mut tx, version_id, desired).await.unwrap();
    tx.commit().await.unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// IDEMPOTENCE
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_pass_inserts_everything() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);

    let mut tx = store.begin().await.unwrap();
    let result = reconcile(&mut tx, version_id, &small_graph()).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(result.points.inserted, 2);
    assert_eq!(result.walls.inserted, 1);
    assert_eq!(result.articles.inserted, 1);
    assert_eq!(result.points.updated + result.walls.updated, 0);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn test_replay_is_identity_stable() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);
    let desired = small_graph();

    apply(&store, version_id, &desired).await;
    let mut tx = store.begin().await.unwrap();
    let (points_a, walls_a, articles_a) = load_graph(&mut tx, version_id).await.unwrap();
    tx.rollback().await.unwrap();

    // Second pass: everything matches by client id, nothing inserted.
    let mut tx = store.begin().await.unwrap();
    let result = reconcile(&mut tx, version_id, &desired).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(result.points.inserted, 0);
    assert_eq!(result.points.updated, 2);
    assert_eq!(result.walls.updated, 1);
    assert_eq!(result.articles.updated, 1);

    let mut tx = store.begin().await.unwrap();
    let (points_b, walls_b, articles_b) = load_graph(&mut tx, version_id).await.unwrap();
    tx.rollback().await.unwrap();

    // Persisted ids survive the replay.
    assert_eq!(points_a, points_b);
    assert_eq!(walls_a, walls_b);
    assert_eq!(articles_a, articles_b);
}

#[tokio::test]
async fn test_update_keeps_persisted_id_and_changes_fields() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);
    let mut desired = small_graph();
    apply(&store, version_id, &desired).await;

    let mut tx = store.begin().await.unwrap();
    let before = tx.find_point(version_id, "p-2").await.unwrap().unwrap();
    tx.rollback().await.unwrap();

    desired.points[1].x = 4.5;
    apply(&store, version_id, &desired).await;

    let mut tx = store.begin().await.unwrap();
    let after = tx.find_point(version_id, "p-2").await.unwrap().unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(after.persisted_id, before.persisted_id);
    assert_eq!(after.x, 4.5);
}

// ─────────────────────────────────────────────────────────────────────────────
// ORPHAN DELETION
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_absent_entities_are_deleted() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);
    apply(&store, version_id, &small_graph()).await;

    // Next save drops the door.
    let mut desired = small_graph();
    desired.articles.clear();
    let mut tx = store.begin().await.unwrap();
    let result = reconcile(&mut tx, version_id, &desired).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(result.articles.deleted, 1);
    assert_eq!(store.article_count(version_id), 0);
    assert_eq!(store.wall_count(version_id), 1);
}

#[tokio::test]
async fn test_empty_desired_graph_clears_the_version() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);
    apply(&store, version_id, &small_graph()).await;

    apply(&store, version_id, &DesiredGraph::default()).await;

    assert_eq!(store.point_count(version_id), 0);
    assert_eq!(store.wall_count(version_id), 0);
    assert_eq!(store.article_count(version_id), 0);
}

#[tokio::test]
async fn test_wall_rewired_away_from_dropped_endpoint() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);
    apply(&store, version_id, &small_graph()).await;

    // The wall survives but swaps its dropped end point for a new one; the
    // orphaned point deletion and the rewire land in the same pass.
    let desired = DesiredGraph {
        points: vec![
            PointInput::at("p-1", 0.0, 0.0, 0.0),
            PointInput::at("p-3", 0.0, 0.0, 4.0),
        ],
        walls: vec![WallInput::between("w-1", "p-1", "p-3")],
        articles: vec![],
    };
    let mut tx = store.begin().await.unwrap();
    let before = tx.find_wall(version_id, "w-1").await.unwrap().unwrap();
    let result = reconcile(&mut tx, version_id, &desired).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(result.points.deleted, 1);
    assert_eq!(result.points.inserted, 1);
    assert_eq!(store.point_count(version_id), 2);

    let mut tx = store.begin().await.unwrap();
    assert!(tx.find_point(version_id, "p-2").await.unwrap().is_none());
    let p3 = tx.find_point(version_id, "p-3").await.unwrap().unwrap();
    let wall = tx.find_wall(version_id, "w-1").await.unwrap().unwrap();
    assert_eq!(wall.persisted_id, before.persisted_id);
    assert_eq!(wall.end_point_id, p3.persisted_id);
}

#[tokio::test]
async fn test_kept_wall_with_dropped_endpoint_fails() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);
    apply(&store, version_id, &small_graph()).await;

    // The wall survives but its end point disappears from the desired set.
    let mut desired = small_graph();
    desired.points.pop();
    let mut tx = store.begin().await.unwrap();
    let err = reconcile(&mut tx, version_id, &desired).await.unwrap_err();
    assert_eq!(err.kind(), "referential_integrity_error");
}

// ─────────────────────────────────────────────────────────────────────────────
// REFERENCE RESOLUTION
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unresolved_wall_endpoint_aborts() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);

    let desired = DesiredGraph {
        points: vec![PointInput::at("p-1", 0.0, 0.0, 0.0)],
        walls: vec![WallInput::between("w-1", "p-1", "p-missing")],
        articles: vec![],
    };
    let mut tx = store.begin().await.unwrap();
    let err = reconcile(&mut tx, version_id, &desired).await.unwrap_err();
    assert_eq!(err.kind(), "referential_integrity_error");
    assert!(err.to_string().contains("p-missing"));
}

#[tokio::test]
async fn test_unresolved_article_attachment_aborts() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);

    let desired = DesiredGraph {
        points: vec![],
        walls: vec![],
        articles: vec![ArticleInput::new(
            "door-1",
            ArticlePayload {
                wall_id: Some("w-missing".to_string()),
                ..Default::default()
            },
        )],
    };
    let mut tx = store.begin().await.unwrap();
    let err = reconcile(&mut tx, version_id, &desired).await.unwrap_err();
    assert_eq!(err.kind(), "referential_integrity_error");
}

#[tokio::test]
async fn test_wall_endpoints_resolve_to_persisted_ids() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);
    apply(&store, version_id, &small_graph()).await;

    let mut tx = store.begin().await.unwrap();
    let p1 = tx.find_point(version_id, "p-1").await.unwrap().unwrap();
    let p2 = tx.find_point(version_id, "p-2").await.unwrap().unwrap();
    let wall = tx.find_wall(version_id, "w-1").await.unwrap().unwrap();
    let door = tx.find_article(version_id, "door-1").await.unwrap().unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(wall.start_point_id, p1.persisted_id);
    assert_eq!(wall.end_point_id, p2.persisted_id);
    assert_eq!(door.wall_id, Some(wall.persisted_id));
}

// ─────────────────────────────────────────────────────────────────────────────
// LEGACY PAYLOADS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_legacy_ids_used_as_identity_and_references() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);

    // Old-style payload: no client_id anywhere, walls reference raw ids.
    let desired = DesiredGraph {
        points: vec![
            PointInput {
                id: Some("point-1".to_string()),
                ..Default::default()
            },
            PointInput {
                id: Some("point-2".to_string()),
                x: 3.0,
                ..Default::default()
            },
        ],
        walls: vec![WallInput {
            id: Some("line-1".to_string()),
            client_id: None,
            ..WallInput::between("ignored", "point-1", "point-2")
        }],
        articles: vec![],
    };

    apply(&store, version_id, &desired).await;
    // Legacy ids become the persisted client ids.
    let mut tx = store.begin().await.unwrap();
    assert!(tx.find_point(version_id, "point-1").await.unwrap().is_some());
    assert!(tx.find_wall(version_id, "line-1").await.unwrap().is_some());

    // Replay stays idempotent through the legacy path too.
    let result = reconcile(&mut tx, version_id, &desired).await.unwrap();
    assert_eq!(result.points.inserted, 0);
    assert_eq!(result.points.updated, 2);
}

#[tokio::test]
async fn test_uuid_payload_id_aliases_wall_references() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);

    // An editor round-trip may send back the persisted uuid in `id` while
    // also assigning a client id; wall references using the raw uuid still
    // resolve through the alias.
    let raw = uuid::Uuid::new_v4().to_string();
    let desired = DesiredGraph {
        points: vec![
            PointInput {
                id: Some(raw.clone()),
                client_id: Some("p-1".to_string()),
                ..Default::default()
            },
            PointInput::at("p-2", 3.0, 0.0, 0.0),
        ],
        walls: vec![WallInput::between("w-1", raw.clone(), "p-2")],
        articles: vec![],
    };

    apply(&store, version_id, &desired).await;
    let mut tx = store.begin().await.unwrap();
    let p1 = tx.find_point(version_id, "p-1").await.unwrap().unwrap();
    let wall = tx.find_wall(version_id, "w-1").await.unwrap().unwrap();
    assert_eq!(wall.start_point_id, p1.persisted_id);
}

#[tokio::test]
async fn test_identity_less_entities_skipped_with_warning() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);

    let desired = DesiredGraph {
        points: vec![
            PointInput::at("p-1", 0.0, 0.0, 0.0),
            // Free-form id that matches no recognized shape, no client id.
            PointInput {
                id: Some("scratch point".to_string()),
                ..Default::default()
            },
        ],
        walls: vec![],
        articles: vec![],
    };
    let mut tx = store.begin().await.unwrap();
    let result = reconcile(&mut tx, version_id, &desired).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(result.points.inserted, 1);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(store.point_count(version_id), 1);
}

#[tokio::test]
async fn test_duplicate_client_ids_conflict() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);

    let desired = DesiredGraph {
        points: vec![
            PointInput::at("p-1", 0.0, 0.0, 0.0),
            PointInput::at("p-1", 1.0, 0.0, 0.0),
        ],
        walls: vec![],
        articles: vec![],
    };
    let mut tx = store.begin().await.unwrap();
    let err = reconcile(&mut tx, version_id, &desired).await.unwrap_err();
    assert_eq!(err.kind(), "conflict_error");
}

// ─────────────────────────────────────────────────────────────────────────────
// TRANSACTIONAL ROLLBACK
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_pass_leaves_persisted_state_untouched() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);
    apply(&store, version_id, &small_graph()).await;

    // A graph that deletes the door and then fails on a dangling wall
    // reference: the deletion must not leak out of the transaction.
    let desired = DesiredGraph {
        points: vec![PointInput::at("p-1", 0.0, 0.0, 0.0)],
        walls: vec![WallInput::between("w-1", "p-1", "p-gone")],
        articles: vec![],
    };
    let mut tx = store.begin().await.unwrap();
    assert!(reconcile(&mut tx, version_id, &desired).await.is_err());
    tx.rollback().await.unwrap();

    assert_eq!(store.point_count(version_id), 2);
    assert_eq!(store.wall_count(version_id), 1);
    assert_eq!(store.article_count(version_id), 1);
}

#[tokio::test]
async fn test_versions_do_not_bleed_into_each_other() {
    let store = InMemoryStore::new();
    let (project_id, v1) = seed_version(&store);
    let version2 = Version::new(project_id, VersionNumber { major: 1, minor: 1 }, "owner-1");
    let v2 = version2.id;
    store.add_version(version2);

    apply(&store, v1, &small_graph()).await;

    // Reconciling an unrelated graph into v2 must not delete v1's rows.
    let other = DesiredGraph {
        points: vec![PointInput::at("q-1", 9.0, 0.0, 0.0)],
        walls: vec![],
        articles: vec![],
    };
    apply(&store, v2, &other).await;

    assert_eq!(store.point_count(v1), 2);
    assert_eq!(store.point_count(v2), 1);
}

#[tokio::test]
async fn test_wall_attributes_survive_reconciliation() {
    let store = InMemoryStore::new();
    let (_, version_id) = seed_version(&store);

    let mut desired = small_graph();
    let mut attributes = BTreeMap::new();
    attributes.insert("material".to_string(), serde_json::json!("brick"));
    attributes.insert("estimate".to_string(), serde_json::json!(1240.5));
    desired.walls[0].attributes = attributes.clone();

    apply(&store, version_id, &desired).await;
    let mut tx = store.begin().await.unwrap();
    let wall = tx.find_wall(version_id, "w-1").await.unwrap().unwrap();
    assert_eq!(wall.attributes, attributes);
}
