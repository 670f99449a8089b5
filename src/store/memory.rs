//! In-memory store for tests and single-process use.
//!
//! Uses `BTreeMap`s for deterministic iteration. Transactions are
//! copy-on-commit: `begin` clones the shared state, all writes go to the
//! staged copy, and `commit` swaps it in. Dropping a transaction discards
//! every staged write, which gives the rollback guarantee the engine relies
//! on. Concurrent transactions are last-commit-wins; that is acceptable for
//! a test backend and documented here so nobody mistakes it for the
//! production concurrency model.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{Store, StoreError, StoreTx};
use crate::types::ids::PersistedId;
use crate::types::{
    Article, Point, Project, ProjectId, ShareId, ShareToken, Version, VersionId, Wall,
};

#[derive(Debug, Clone, Default)]
struct State {
    projects: BTreeMap<ProjectId, Project>,
    versions: BTreeMap<VersionId, Version>,
    points: BTreeMap<PersistedId, (VersionId, Point)>,
    walls: BTreeMap<PersistedId, (VersionId, Wall)>,
    articles: BTreeMap<PersistedId, (VersionId, Article)>,
    shares: BTreeMap<ShareId, ShareToken>,
}

/// In-memory store backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a project directly, outside any transaction.
    pub fn add_project(&self, project: Project) {
        self.state.write().projects.insert(project.id, project);
    }

    /// Seed a version directly, outside any transaction.
    pub fn add_version(&self, version: Version) {
        self.state.write().versions.insert(version.id, version);
    }

    /// Number of points persisted for a version.
    pub fn point_count(&self, version_id: VersionId) -> usize {
        self.state
            .read()
            .points
            .values()
            .filter(|(v, _)| *v == version_id)
            .count()
    }

    /// Number of walls persisted for a version.
    pub fn wall_count(&self, version_id: VersionId) -> usize {
        self.state
            .read()
            .walls
            .values()
            .filter(|(v, _)| *v == version_id)
            .count()
    }

    /// Number of articles persisted for a version.
    pub fn article_count(&self, version_id: VersionId) -> usize {
        self.state
            .read()
            .articles
            .values()
            .filter(|(v, _)| *v == version_id)
            .count()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(InMemoryTx {
            shared: Arc::clone(&self.state),
            staged: self.state.read().clone(),
        })
    }
}

/// Copy-on-commit transaction over [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTx {
    shared: Arc<RwLock<State>>,
    staged: State,
}

fn sorted_by_client_id<T>(mut items: Vec<T>, key: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| key(a).cmp(key(b)));
    items
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn insert_project(&mut self, project: &Project) -> Result<(), StoreError> {
        self.staged.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn project(&mut self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.staged.projects.get(&id).cloned())
    }

    async fn delete_project(&mut self, id: ProjectId) -> Result<(), StoreError> {
        let version_ids: Vec<VersionId> = self
            .staged
            .versions
            .values()
            .filter(|v| v.project_id == id)
            .map(|v| v.id)
            .collect();
        for vid in &version_ids {
            self.staged.articles.retain(|_, (v, _)| v != vid);
            self.staged.walls.retain(|_, (v, _)| v != vid);
            self.staged.points.retain(|_, (v, _)| v != vid);
            self.staged.versions.remove(vid);
        }
        self.staged.shares.retain(|_, s| s.project_id != id);
        self.staged.projects.remove(&id);
        Ok(())
    }

    async fn insert_version(&mut self, version: &Version) -> Result<(), StoreError> {
        self.staged.versions.insert(version.id, version.clone());
        Ok(())
    }

    async fn version(&mut self, id: VersionId) -> Result<Option<Version>, StoreError> {
        Ok(self.staged.versions.get(&id).cloned())
    }

    async fn latest_version(
        &mut self,
        project_id: ProjectId,
    ) -> Result<Option<Version>, StoreError> {
        Ok(self
            .staged
            .versions
            .values()
            .filter(|v| v.project_id == project_id)
            .max_by_key(|v| v.number)
            .cloned())
    }

    async fn touch_version(&mut self, id: VersionId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let version = self
            .staged
            .versions
            .get_mut(&id)
            .ok_or_else(|| StoreError::RowNotFound(format!("version {id}")))?;
        version.last_modified = at;
        Ok(())
    }

    async fn points_by_version(
        &mut self,
        version_id: VersionId,
    ) -> Result<Vec<Point>, StoreError> {
        let points: Vec<Point> = self
            .staged
            .points
            .values()
            .filter(|(v, _)| *v == version_id)
            .map(|(_, p)| p.clone())
            .collect();
        Ok(sorted_by_client_id(points, |p| &p.client_id))
    }

    async fn find_point(
        &mut self,
        version_id: VersionId,
        client_id: &str,
    ) -> Result<Option<Point>, StoreError> {
        Ok(self
            .staged
            .points
            .values()
            .find(|(v, p)| *v == version_id && p.client_id == client_id)
            .map(|(_, p)| p.clone()))
    }

    async fn insert_point(
        &mut self,
        version_id: VersionId,
        point: &Point,
    ) -> Result<(), StoreError> {
        self.staged
            .points
            .insert(point.persisted_id, (version_id, point.clone()));
        Ok(())
    }

    async fn update_point(&mut self, point: &Point) -> Result<(), StoreError> {
        let (_, row) = self
            .staged
            .points
            .get_mut(&point.persisted_id)
            .ok_or_else(|| StoreError::RowNotFound(format!("point {}", point.persisted_id)))?;
        *row = point.clone();
        Ok(())
    }

    async fn delete_point(&mut self, persisted_id: PersistedId) -> Result<(), StoreError> {
        self.staged.points.remove(&persisted_id);
        Ok(())
    }

    async fn walls_by_version(&mut self, version_id: VersionId) -> Result<Vec<Wall>, StoreError> {
        let walls: Vec<Wall> = self
            .staged
            .walls
            .values()
            .filter(|(v, _)| *v == version_id)
            .map(|(_, w)| w.clone())
            .collect();
        Ok(sorted_by_client_id(walls, |w| &w.client_id))
    }

    async fn find_wall(
        &mut self,
        version_id: VersionId,
        client_id: &str,
    ) -> Result<Option<Wall>, StoreError> {
        Ok(self
            .staged
            .walls
            .values()
            .find(|(v, w)| *v == version_id && w.client_id == client_id)
            .map(|(_, w)| w.clone()))
    }

    async fn insert_wall(&mut self, version_id: VersionId, wall: &Wall) -> Result<(), StoreError> {
        self.staged
            .walls
            .insert(wall.persisted_id, (version_id, wall.clone()));
        Ok(())
    }

    async fn update_wall(&mut self, wall: &Wall) -> Result<(), StoreError> {
        let (_, row) = self
            .staged
            .walls
            .get_mut(&wall.persisted_id)
            .ok_or_else(|| StoreError::RowNotFound(format!("wall {}", wall.persisted_id)))?;
        *row = wall.clone();
        Ok(())
    }

    async fn delete_wall(&mut self, persisted_id: PersistedId) -> Result<(), StoreError> {
        self.staged.walls.remove(&persisted_id);
        Ok(())
    }

    async fn articles_by_version(
        &mut self,
        version_id: VersionId,
    ) -> Result<Vec<Article>, StoreError> {
        let articles: Vec<Article> = self
            .staged
            .articles
            .values()
            .filter(|(v, _)| *v == version_id)
            .map(|(_, a)| a.clone())
            .collect();
        Ok(sorted_by_client_id(articles, |a| &a.client_id))
    }

    async fn find_article(
        &mut self,
        version_id: VersionId,
        client_id: &str,
    ) -> Result<Option<Article>, StoreError> {
        Ok(self
            .staged
            .articles
            .values()
            .find(|(v, a)| *v == version_id && a.client_id == client_id)
            .map(|(_, a)| a.clone()))
    }

    async fn insert_article(
        &mut self,
        version_id: VersionId,
        article: &Article,
    ) -> Result<(), StoreError> {
        self.staged
            .articles
            .insert(article.persisted_id, (version_id, article.clone()));
        Ok(())
    }

    async fn update_article(&mut self, article: &Article) -> Result<(), StoreError> {
        let (_, row) = self
            .staged
            .articles
            .get_mut(&article.persisted_id)
            .ok_or_else(|| {
                StoreError::RowNotFound(format!("article {}", article.persisted_id))
            })?;
        *row = article.clone();
        Ok(())
    }

    async fn delete_article(&mut self, persisted_id: PersistedId) -> Result<(), StoreError> {
        self.staged.articles.remove(&persisted_id);
        Ok(())
    }

    async fn insert_share(&mut self, share: &ShareToken) -> Result<(), StoreError> {
        self.staged.shares.insert(share.id, share.clone());
        Ok(())
    }

    async fn share(&mut self, id: ShareId) -> Result<Option<ShareToken>, StoreError> {
        Ok(self.staged.shares.get(&id).cloned())
    }

    async fn share_by_hash(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<ShareToken>, StoreError> {
        Ok(self
            .staged
            .shares
            .values()
            .find(|s| s.token_hash == token_hash)
            .cloned())
    }

    async fn update_share(&mut self, share: &ShareToken) -> Result<(), StoreError> {
        let row = self
            .staged
            .shares
            .get_mut(&share.id)
            .ok_or_else(|| StoreError::RowNotFound(format!("share {}", share.id)))?;
        *row = share.clone();
        Ok(())
    }

    async fn increment_share_views(&mut self, id: ShareId) -> Result<bool, StoreError> {
        let share = self
            .staged
            .shares
            .get_mut(&id)
            .ok_or_else(|| StoreError::RowNotFound(format!("share {id}")))?;
        if let Some(max) = share.max_views {
            if share.views_count >= max {
                return Ok(false);
            }
        }
        share.views_count += 1;
        Ok(true)
    }

    async fn commit(self) -> Result<(), StoreError> {
        *self.shared.write() = self.staged;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
