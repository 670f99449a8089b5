//! Version lifecycle: numbering, creation, cloning and the save path.
//!
//! Every operation opens one store transaction, runs its reads and writes
//! inside it, and commits at the end; on any error the transaction is rolled
//! back and persisted state is untouched.

use std::sync::Arc;

use chrono::Utc;

use crate::error::KernelError;
use crate::reconcile::{load_graph, reconcile, ReconciliationResult};
use crate::store::{Store, StoreTx};
use crate::types::{
    ArticleInput, ArticlePayload, DesiredGraph, GraphSnapshot, PointInput, ProjectId, Version,
    VersionId, VersionNumber, WallInput,
};

/// Manages versions of floorplan projects.
///
/// Cloning reuses the reconciliation engine's identity-mapping primitive:
/// the source graph is rewritten back into client space (client ids
/// preserved) and reconciled into the fresh version, which assigns new
/// persisted ids and re-resolves every reference.
pub struct VersionManager<S: Store> {
    store: Arc<S>,
}

impl<S: Store> VersionManager<S> {
    /// Create a manager over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create the next version of a project and persist `desired` into it.
    ///
    /// The new version's number is the project's latest bumped by one minor,
    /// or `"1.0"` for a project with no versions yet.
    pub async fn create_version(
        &self,
        project_id: ProjectId,
        desired: &DesiredGraph,
        author: &str,
    ) -> Result<Version, KernelError> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<Version, KernelError> = async {
            let project = tx
                .project(project_id)
                .await?
                .ok_or_else(|| KernelError::not_found(format!("project {project_id}")))?;

            let number = match tx.latest_version(project.id).await? {
                Some(latest) => latest.number.next(),
                None => VersionNumber::first(),
            };
            let version = Version::new(project.id, number, author);
            tx.insert_version(&version).await?;

            // A fresh version has no prior graph, so the pass is pure upsert.
            reconcile(&mut tx, version.id, desired).await?;
            Ok(version)
        }
        .await;

        match outcome {
            Ok(version) => {
                tx.commit().await?;
                tracing::info!(version_id = %version.id, number = %version.number, "created version");
                Ok(version)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// The common save path: full reconciliation of an existing version,
    /// then a `last_modified` bump.
    pub async fn update_version(
        &self,
        version_id: VersionId,
        desired: &DesiredGraph,
    ) -> Result<ReconciliationResult, KernelError> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<ReconciliationResult, KernelError> = async {
            tx.version(version_id)
                .await?
                .ok_or_else(|| KernelError::not_found(format!("version {version_id}")))?;
            let result = reconcile(&mut tx, version_id, desired).await?;
            tx.touch_version(version_id, Utc::now()).await?;
            Ok(result)
        }
        .await;

        match outcome {
            Ok(result) => {
                tx.commit().await?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Clone a version's entire graph into a new version of the same project.
    ///
    /// Client ids are preserved; persisted ids are freshly assigned and all
    /// wall/article references are rewritten against the new rows.
    pub async fn clone_version(&self, source_version_id: VersionId) -> Result<Version, KernelError> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<Version, KernelError> = async {
            let source = tx
                .version(source_version_id)
                .await?
                .ok_or_else(|| KernelError::not_found(format!("version {source_version_id}")))?;

            let desired = desired_from_persisted(&mut tx, source_version_id).await?;

            let number = match tx.latest_version(source.project_id).await? {
                Some(latest) => latest.number.next(),
                None => VersionNumber::first(),
            };
            let mut version = Version::new(source.project_id, number, &source.created_by);
            version.plan_image_url = source.plan_image_url.clone();
            tx.insert_version(&version).await?;

            reconcile(&mut tx, version.id, &desired).await?;
            Ok(version)
        }
        .await;

        match outcome {
            Ok(version) => {
                tx.commit().await?;
                tracing::info!(
                    source = %source_version_id,
                    clone = %version.id,
                    number = %version.number,
                    "cloned version"
                );
                Ok(version)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Read-only snapshot of a version's graph.
    pub async fn snapshot(&self, version_id: VersionId) -> Result<GraphSnapshot, KernelError> {
        let mut tx = self.store.begin().await?;
        let version = tx
            .version(version_id)
            .await?
            .ok_or_else(|| KernelError::not_found(format!("version {version_id}")))?;
        let (points, walls, articles) = load_graph(&mut tx, version_id).await?;
        tx.rollback().await?;
        Ok(GraphSnapshot::new(version, points, walls, articles))
    }

    /// Delete a project and everything it owns: versions, graphs, shares.
    pub async fn delete_project(&self, project_id: ProjectId) -> Result<(), KernelError> {
        let mut tx = self.store.begin().await?;
        tx.project(project_id)
            .await?
            .ok_or_else(|| KernelError::not_found(format!("project {project_id}")))?;
        tx.delete_project(project_id).await?;
        tx.commit().await?;
        tracing::info!(project_id = %project_id, "deleted project");
        Ok(())
    }
}

/// Rewrite a persisted graph back into client space, preserving client ids.
///
/// Persisted-space references are translated through each kind's
/// `persisted_id -> client_id` map; a dangling reference here means stored
/// data already violates referential integrity and the operation fails
/// rather than silently dropping the reference.
async fn desired_from_persisted<T: StoreTx>(
    tx: &mut T,
    version_id: VersionId,
) -> Result<DesiredGraph, KernelError> {
    use std::collections::HashMap;

    let (points, walls, articles) = load_graph(tx, version_id).await?;

    let point_clients: HashMap<_, _> = points
        .iter()
        .map(|p| (p.persisted_id, p.client_id.clone()))
        .collect();
    let wall_clients: HashMap<_, _> = walls
        .iter()
        .map(|w| (w.persisted_id, w.client_id.clone()))
        .collect();

    let desired_points = points
        .iter()
        .map(|p| PointInput {
            id: None,
            client_id: Some(p.client_id.clone()),
            x: p.x,
            y: p.y,
            z: p.z,
            rotation: p.rotation,
            snap_angle: p.snap_angle,
        })
        .collect();

    let desired_walls = walls
        .iter()
        .map(|w| {
            let start = point_clients
                .get(&w.start_point_id)
                .ok_or_else(|| KernelError::unresolved(&w.client_id, w.start_point_id.to_string()))?;
            let end = point_clients
                .get(&w.end_point_id)
                .ok_or_else(|| KernelError::unresolved(&w.client_id, w.end_point_id.to_string()))?;
            Ok(WallInput {
                id: None,
                client_id: Some(w.client_id.clone()),
                start_point_id: start.clone(),
                end_point_id: end.clone(),
                length: w.length,
                rotation: w.rotation,
                thickness: w.thickness,
                height: w.height,
                color: w.color.clone(),
                texture: w.texture.clone(),
                attributes: w.attributes.clone(),
            })
        })
        .collect::<Result<Vec<_>, KernelError>>()?;

    let desired_articles = articles
        .iter()
        .map(|a| {
            let wall_ref = a
                .wall_id
                .map(|id| {
                    wall_clients
                        .get(&id)
                        .cloned()
                        .ok_or_else(|| KernelError::unresolved(&a.client_id, id.to_string()))
                })
                .transpose()?;
            let point_ref = a
                .reference_point_id
                .map(|id| {
                    point_clients
                        .get(&id)
                        .cloned()
                        .ok_or_else(|| KernelError::unresolved(&a.client_id, id.to_string()))
                })
                .transpose()?;
            Ok(ArticleInput {
                id: None,
                client_id: Some(a.client_id.clone()),
                payload: ArticlePayload {
                    position: a.position,
                    rotation: a.rotation,
                    wall_id: wall_ref,
                    reference_point_id: point_ref,
                    display: a.display.clone(),
                },
            })
        })
        .collect::<Result<Vec<_>, KernelError>>()?;

    Ok(DesiredGraph {
        points: desired_points,
        walls: desired_walls,
        articles: desired_articles,
    })
}
