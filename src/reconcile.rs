//! Graph reconciliation: make persisted state match a desired graph exactly.
//!
//! ## Algorithm
//!
//! Four strictly ordered phases, all inside the caller's transaction:
//!
//! 1. **Identity classification.** Resolve every desired entity to an
//!    [`EntityRef`] (explicit client id, else legacy payload id). Entities
//!    with no derivable identity are skipped with a warning; duplicate
//!    identities within one kind are a conflict.
//! 2. **Orphan deletion.** A persisted entity whose client id is absent from
//!    the desired set is deleted. Dependents go first: articles, then walls,
//!    then points, so no surviving row ever dangles mid-pass.
//! 3. **Upsert.** Match by `(client_id, version_id)`; update in place keeps
//!    the persisted id stable, insert assigns a fresh one. Points first,
//!    then walls, then articles.
//! 4. **Reference resolution.** Translate wall endpoints and article
//!    attachments from client space to persisted space through the
//!    `client_id -> persisted_id` map built during upsert (legacy payload
//!    ids alias into the same map). An unresolvable reference aborts the
//!    pass with a referential-integrity error.
//!
//! Replaying the identical desired graph is a no-op on identity: upsert
//! always matches by client id before inserting, so persisted ids are stable
//! and no duplicate rows appear. Any phase failure propagates to the caller,
//! which must roll the transaction back; no partial graph survives an error.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::KernelError;
use crate::store::StoreTx;
use crate::types::ids::PersistedId;
use crate::types::{
    Article, ArticleInput, DesiredGraph, EntityRef, Point, PointInput, VersionId, Wall, WallInput,
};

/// Per-kind write counts of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    /// Rows inserted.
    pub inserted: usize,
    /// Rows updated in place.
    pub updated: usize,
    /// Orphan rows deleted.
    pub deleted: usize,
}

/// Outcome of a successful reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Point writes.
    pub points: KindCounts,
    /// Wall writes.
    pub walls: KindCounts,
    /// Article writes.
    pub articles: KindCounts,
    /// Entities skipped for lack of a derivable identity.
    pub warnings: Vec<String>,
}

/// Phase 1: classify one kind's inputs, skipping identity-less entities and
/// rejecting duplicate identities.
fn classify_kind<'a, T>(
    items: &'a [T],
    kind: &str,
    id: impl Fn(&T) -> Option<&str>,
    client_id: impl Fn(&T) -> Option<&str>,
    warnings: &mut Vec<String>,
) -> Result<Vec<(EntityRef, &'a T)>, KernelError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut classified = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match EntityRef::classify(id(item), client_id(item)) {
            Some(entity_ref) => {
                if !seen.insert(entity_ref.key().to_string()) {
                    return Err(KernelError::Conflict(entity_ref.key().to_string()));
                }
                classified.push((entity_ref, item));
            }
            None => {
                let warning = format!("{kind} at index {index} has no derivable identity; skipped");
                tracing::warn!(kind, index, "skipping entity without identity");
                warnings.push(warning);
            }
        }
    }
    Ok(classified)
}

/// Synchronize persisted state for `version_id` with `desired`.
///
/// Must run inside a transaction the caller commits on success and rolls
/// back on error.
pub async fn reconcile<T: StoreTx>(
    tx: &mut T,
    version_id: VersionId,
    desired: &DesiredGraph,
) -> Result<ReconciliationResult, KernelError> {
    let mut result = ReconciliationResult::default();

    // Phase 1: identity classification.
    let points = classify_kind(
        &desired.points,
        "point",
        |p: &PointInput| p.id.as_deref(),
        |p| p.client_id.as_deref(),
        &mut result.warnings,
    )?;
    let walls = classify_kind(
        &desired.walls,
        "wall",
        |w: &WallInput| w.id.as_deref(),
        |w| w.client_id.as_deref(),
        &mut result.warnings,
    )?;
    let articles = classify_kind(
        &desired.articles,
        "article",
        |a: &ArticleInput| a.id.as_deref(),
        |a| a.client_id.as_deref(),
        &mut result.warnings,
    )?;

    // Phase 2: orphan deletion, dependents first.
    fn desired_keys<T>(set: &[(EntityRef, &T)]) -> HashSet<String> {
        set.iter().map(|(r, _)| r.key().to_string()).collect()
    }
    let point_keys = desired_keys(&points);
    let wall_keys = desired_keys(&walls);
    let article_keys = desired_keys(&articles);

    for article in tx.articles_by_version(version_id).await? {
        if !article_keys.contains(&article.client_id) {
            tx.delete_article(article.persisted_id).await?;
            result.articles.deleted += 1;
        }
    }
    for wall in tx.walls_by_version(version_id).await? {
        if !wall_keys.contains(&wall.client_id) {
            tx.delete_wall(wall.persisted_id).await?;
            result.walls.deleted += 1;
        }
    }
    for point in tx.points_by_version(version_id).await? {
        if !point_keys.contains(&point.client_id) {
            tx.delete_point(point.persisted_id).await?;
            result.points.deleted += 1;
        }
    }

    // Phases 3 and 4: upsert in dependency order, building the client->
    // persisted map as each kind lands.
    let mut point_map: HashMap<String, PersistedId> = HashMap::new();
    for (entity_ref, input) in &points {
        let key = entity_ref.key();
        let persisted_id = match tx.find_point(version_id, key).await? {
            Some(mut existing) => {
                existing.apply(input);
                tx.update_point(&existing).await?;
                result.points.updated += 1;
                existing.persisted_id
            }
            None => {
                let point = Point {
                    persisted_id: PersistedId::new(),
                    client_id: key.to_string(),
                    x: input.x,
                    y: input.y,
                    z: input.z,
                    rotation: input.rotation,
                    snap_angle: input.snap_angle,
                };
                tx.insert_point(version_id, &point).await?;
                result.points.inserted += 1;
                point.persisted_id
            }
        };
        point_map.insert(key.to_string(), persisted_id);
        // Legacy payload ids alias to the same row so old-style wall
        // references keep resolving.
        if let Some(raw) = &input.id {
            point_map.entry(raw.clone()).or_insert(persisted_id);
        }
    }

    let mut wall_map: HashMap<String, PersistedId> = HashMap::new();
    for (entity_ref, input) in &walls {
        let key = entity_ref.key();
        let start = *point_map
            .get(&input.start_point_id)
            .ok_or_else(|| KernelError::unresolved(key, &input.start_point_id))?;
        let end = *point_map
            .get(&input.end_point_id)
            .ok_or_else(|| KernelError::unresolved(key, &input.end_point_id))?;

        let persisted_id = match tx.find_wall(version_id, key).await? {
            Some(mut existing) => {
                existing.apply(input, start, end);
                tx.update_wall(&existing).await?;
                result.walls.updated += 1;
                existing.persisted_id
            }
            None => {
                let wall = Wall {
                    persisted_id: PersistedId::new(),
                    client_id: key.to_string(),
                    start_point_id: start,
                    end_point_id: end,
                    length: input.length,
                    rotation: input.rotation,
                    thickness: input.thickness,
                    height: input.height,
                    color: input.color.clone(),
                    texture: input.texture.clone(),
                    attributes: input.attributes.clone(),
                };
                tx.insert_wall(version_id, &wall).await?;
                result.walls.inserted += 1;
                wall.persisted_id
            }
        };
        wall_map.insert(key.to_string(), persisted_id);
        if let Some(raw) = &input.id {
            wall_map.entry(raw.clone()).or_insert(persisted_id);
        }
    }

    for (entity_ref, input) in &articles {
        let key = entity_ref.key();
        let wall_id = match &input.payload.wall_id {
            Some(reference) => Some(
                *wall_map
                    .get(reference)
                    .ok_or_else(|| KernelError::unresolved(key, reference))?,
            ),
            None => None,
        };
        let reference_point_id = match &input.payload.reference_point_id {
            Some(reference) => Some(
                *point_map
                    .get(reference)
                    .ok_or_else(|| KernelError::unresolved(key, reference))?,
            ),
            None => None,
        };

        match tx.find_article(version_id, key).await? {
            Some(mut existing) => {
                existing.apply(&input.payload, wall_id, reference_point_id);
                tx.update_article(&existing).await?;
                result.articles.updated += 1;
            }
            None => {
                let article = Article {
                    persisted_id: PersistedId::new(),
                    client_id: key.to_string(),
                    position: input.payload.position,
                    rotation: input.payload.rotation,
                    wall_id,
                    reference_point_id,
                    display: input.payload.display.clone(),
                };
                tx.insert_article(version_id, &article).await?;
                result.articles.inserted += 1;
            }
        }
    }

    tracing::info!(
        version_id = %version_id,
        points = ?result.points,
        walls = ?result.walls,
        articles = ?result.articles,
        skipped = result.warnings.len(),
        "reconciled graph"
    );

    Ok(result)
}

/// Fetch one version's full persisted graph.
pub async fn load_graph<T: StoreTx>(
    tx: &mut T,
    version_id: VersionId,
) -> Result<(Vec<Point>, Vec<Wall>, Vec<Article>), KernelError> {
    let points = tx.points_by_version(version_id).await?;
    let walls = tx.walls_by_version(version_id).await?;
    let articles = tx.articles_by_version(version_id).await?;
    Ok((points, walls, articles))
}
