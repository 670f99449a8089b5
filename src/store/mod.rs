//! Persistence backends for the floorplan kernel.
//!
//! The kernel talks to storage through [`Store`]/[`StoreTx`]. Every engine
//! operation (reconcile, clone, share validation) runs its reads and writes
//! against a single [`StoreTx`] and commits at the end; dropping or rolling
//! back a transaction must leave persisted state untouched. That transactional
//! grouping is a correctness requirement, not an optimization: concurrent
//! saves against one version would otherwise race into lost updates and
//! duplicate rows.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{
    Article, Point, Project, ProjectId, ShareId, ShareToken, Version, VersionId, Wall,
};
use crate::types::ids::PersistedId;

/// Error type shared by store backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A targeted row does not exist.
    #[error("row not found: {0}")]
    RowNotFound(String),
    /// Backend failure (connection, SQL, serialization).
    #[error("backend: {0}")]
    Backend(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::RowNotFound("query returned no rows".to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

/// A storage backend capable of opening transactions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Transaction handle type.
    type Tx: StoreTx;

    /// Begin a transaction. All engine work happens inside one.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// One transactional unit of work against the store.
///
/// Implementations must guarantee deterministic ordering of `list_*` results
/// (sorted by client id) and must not publish any write before `commit`.
#[async_trait]
pub trait StoreTx: Send {
    // ── Projects ─────────────────────────────────────────────────────────

    /// Insert a project row.
    async fn insert_project(&mut self, project: &Project) -> Result<(), StoreError>;

    /// Fetch a project by id.
    async fn project(&mut self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    /// Delete a project and cascade to its versions, graphs and share tokens.
    async fn delete_project(&mut self, id: ProjectId) -> Result<(), StoreError>;

    // ── Versions ─────────────────────────────────────────────────────────

    /// Insert a version row.
    async fn insert_version(&mut self, version: &Version) -> Result<(), StoreError>;

    /// Fetch a version by id.
    async fn version(&mut self, id: VersionId) -> Result<Option<Version>, StoreError>;

    /// The highest-numbered version of a project, if any.
    async fn latest_version(&mut self, project_id: ProjectId)
        -> Result<Option<Version>, StoreError>;

    /// Update a version's `last_modified` timestamp.
    async fn touch_version(&mut self, id: VersionId, at: DateTime<Utc>) -> Result<(), StoreError>;

    // ── Points ───────────────────────────────────────────────────────────

    /// All points of a version, sorted by client id.
    async fn points_by_version(&mut self, version_id: VersionId)
        -> Result<Vec<Point>, StoreError>;

    /// Look up a point by `(version_id, client_id)`.
    async fn find_point(
        &mut self,
        version_id: VersionId,
        client_id: &str,
    ) -> Result<Option<Point>, StoreError>;

    /// Insert a point into a version.
    async fn insert_point(&mut self, version_id: VersionId, point: &Point)
        -> Result<(), StoreError>;

    /// Update a point row, matched by its persisted id.
    async fn update_point(&mut self, point: &Point) -> Result<(), StoreError>;

    /// Delete a point row.
    async fn delete_point(&mut self, persisted_id: PersistedId) -> Result<(), StoreError>;

    // ── Walls ────────────────────────────────────────────────────────────

    /// All walls of a version, sorted by client id.
    async fn walls_by_version(&mut self, version_id: VersionId) -> Result<Vec<Wall>, StoreError>;

    /// Look up a wall by `(version_id, client_id)`.
    async fn find_wall(
        &mut self,
        version_id: VersionId,
        client_id: &str,
    ) -> Result<Option<Wall>, StoreError>;

    /// Insert a wall into a version.
    async fn insert_wall(&mut self, version_id: VersionId, wall: &Wall) -> Result<(), StoreError>;

    /// Update a wall row, matched by its persisted id.
    async fn update_wall(&mut self, wall: &Wall) -> Result<(), StoreError>;

    /// Delete a wall row.
    async fn delete_wall(&mut self, persisted_id: PersistedId) -> Result<(), StoreError>;

    // ── Articles ─────────────────────────────────────────────────────────

    /// All articles of a version, sorted by client id.
    async fn articles_by_version(
        &mut self,
        version_id: VersionId,
    ) -> Result<Vec<Article>, StoreError>;

    /// Look up an article by `(version_id, client_id)`.
    async fn find_article(
        &mut self,
        version_id: VersionId,
        client_id: &str,
    ) -> Result<Option<Article>, StoreError>;

    /// Insert an article into a version.
    async fn insert_article(
        &mut self,
        version_id: VersionId,
        article: &Article,
    ) -> Result<(), StoreError>;

    /// Update an article row, matched by its persisted id.
    async fn update_article(&mut self, article: &Article) -> Result<(), StoreError>;

    /// Delete an article row.
    async fn delete_article(&mut self, persisted_id: PersistedId) -> Result<(), StoreError>;

    // ── Share tokens ─────────────────────────────────────────────────────

    /// Insert a share token row.
    async fn insert_share(&mut self, share: &ShareToken) -> Result<(), StoreError>;

    /// Fetch a share token by id.
    async fn share(&mut self, id: ShareId) -> Result<Option<ShareToken>, StoreError>;

    /// Fetch a share token by secret hash.
    async fn share_by_hash(&mut self, token_hash: &str)
        -> Result<Option<ShareToken>, StoreError>;

    /// Update a share token row (revocation), matched by its id.
    async fn update_share(&mut self, share: &ShareToken) -> Result<(), StoreError>;

    /// Atomically increment a share token's view counter, guarded by its
    /// view budget. Returns `false` without incrementing when the budget is
    /// exhausted. Single conditional update, never read-then-write.
    async fn increment_share_views(&mut self, id: ShareId) -> Result<bool, StoreError>;

    // ── Transaction control ──────────────────────────────────────────────

    /// Publish all writes. Dropping a transaction without committing
    /// discards them.
    async fn commit(self) -> Result<(), StoreError>;

    /// Explicitly discard all writes.
    async fn rollback(self) -> Result<(), StoreError>;
}

pub use memory::InMemoryStore;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresStore};
