//! Graph containers: the client-submitted desired graph and the read-only
//! persisted snapshot.

use serde::{Deserialize, Serialize};

use super::article::{Article, ArticleInput};
use super::point::{Point, PointInput};
use super::version::Version;
use super::wall::{Wall, WallInput};

/// A full client-supplied graph: the state persisted storage should converge
/// to for one version.
///
/// All cross-entity references are client-space strings; the reconciliation
/// engine translates them to persisted ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredGraph {
    /// Desired points.
    #[serde(default)]
    pub points: Vec<PointInput>,
    /// Desired walls.
    #[serde(default)]
    pub walls: Vec<WallInput>,
    /// Desired articles (doors/windows/custom objects).
    #[serde(default)]
    pub articles: Vec<ArticleInput>,
}

impl DesiredGraph {
    /// Whether the graph is entirely empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.walls.is_empty() && self.articles.is_empty()
    }

    /// Adopt each entity's raw `id` as its `client_id` where no explicit
    /// client id is set.
    ///
    /// The geometry importer emits temp ids in the `id` field and leaves
    /// `client_id` unset; a caller persisting an imported graph applies this
    /// before reconciling.
    pub fn adopt_ids_as_client_ids(mut self) -> Self {
        for p in &mut self.points {
            if p.client_id.is_none() {
                p.client_id = p.id.clone();
            }
        }
        for w in &mut self.walls {
            if w.client_id.is_none() {
                w.client_id = w.id.clone();
            }
        }
        for a in &mut self.articles {
            if a.client_id.is_none() {
                a.client_id = a.id.clone();
            }
        }
        self
    }
}

fn default_schema_version() -> String {
    crate::KERNEL_SCHEMA_VERSION.to_string()
}

/// A read-only snapshot of one version's persisted graph.
///
/// Entities are sorted by `client_id` for deterministic output. All
/// references are persisted-space. This is what share-token validation hands
/// out; it is not editable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Kernel schema version stamped into every exported snapshot.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// The version this snapshot belongs to.
    pub version: Version,
    /// Points, sorted by client id.
    pub points: Vec<Point>,
    /// Walls, sorted by client id.
    pub walls: Vec<Wall>,
    /// Articles, sorted by client id.
    pub articles: Vec<Article>,
}

impl GraphSnapshot {
    /// Assemble a snapshot, sorting each kind by client id.
    pub fn new(
        version: Version,
        mut points: Vec<Point>,
        mut walls: Vec<Wall>,
        mut articles: Vec<Article>,
    ) -> Self {
        points.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        walls.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        articles.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Self {
            schema_version: default_schema_version(),
            version,
            points,
            walls,
            articles,
        }
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of walls.
    pub fn num_walls(&self) -> usize {
        self.walls.len()
    }

    /// Number of articles.
    pub fn num_articles(&self) -> usize {
        self.articles.len()
    }

    /// Look up a point by client id.
    pub fn point(&self, client_id: &str) -> Option<&Point> {
        self.points
            .binary_search_by(|p| p.client_id.as_str().cmp(client_id))
            .ok()
            .map(|i| &self.points[i])
    }

    /// Look up a wall by client id.
    pub fn wall(&self, client_id: &str) -> Option<&Wall> {
        self.walls
            .binary_search_by(|w| w.client_id.as_str().cmp(client_id))
            .ok()
            .map(|i| &self.walls[i])
    }

    /// Look up an article by client id.
    pub fn article(&self, client_id: &str) -> Option<&Article> {
        self.articles
            .binary_search_by(|a| a.client_id.as_str().cmp(client_id))
            .ok()
            .map(|i| &self.articles[i])
    }
}
