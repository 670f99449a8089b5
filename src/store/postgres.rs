//! PostgreSQL store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Wire compatibility
//!
//! Wall point references persist under the legacy column names
//! `startpointid`/`endpointid`, and articles persist their payload as one
//! JSON blob; both shapes interoperate with existing stored data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

use super::{Store, StoreError, StoreTx};
use crate::types::ids::PersistedId;
use crate::types::{
    Article, ArticlePayload, Color, Point, Project, ProjectId, ShareId, ShareScope, ShareToken,
    Version, VersionId, VersionNumber, Wall,
};

/// Table definitions for the kernel's schema.
///
/// Wall point references are deferred to commit: within one reconciliation
/// transaction, orphan points are deleted before surviving walls are rewired,
/// so the constraint only holds at transaction end.
pub const KERNEL_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id UUID PRIMARY KEY,
    owner_id TEXT NOT NULL,
    name TEXT NOT NULL,
    created_on TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS versions (
    id UUID PRIMARY KEY,
    project_id UUID NOT NULL REFERENCES projects(id),
    major INT NOT NULL,
    minor INT NOT NULL,
    created_on TIMESTAMPTZ NOT NULL,
    last_modified TIMESTAMPTZ NOT NULL,
    created_by TEXT NOT NULL,
    plan_image_url TEXT,
    UNIQUE (project_id, major, minor)
);

CREATE TABLE IF NOT EXISTS points (
    id UUID PRIMARY KEY,
    version_id UUID NOT NULL REFERENCES versions(id),
    client_id TEXT NOT NULL,
    x DOUBLE PRECISION NOT NULL,
    y DOUBLE PRECISION NOT NULL,
    z DOUBLE PRECISION NOT NULL,
    rotation DOUBLE PRECISION NOT NULL,
    snap_angle DOUBLE PRECISION NOT NULL,
    UNIQUE (version_id, client_id)
);

CREATE TABLE IF NOT EXISTS walls (
    id UUID PRIMARY KEY,
    version_id UUID NOT NULL REFERENCES versions(id),
    client_id TEXT NOT NULL,
    startpointid UUID NOT NULL REFERENCES points(id) DEFERRABLE INITIALLY DEFERRED,
    endpointid UUID NOT NULL REFERENCES points(id) DEFERRABLE INITIALLY DEFERRED,
    length DOUBLE PRECISION NOT NULL,
    rotation DOUBLE PRECISION NOT NULL,
    thickness DOUBLE PRECISION NOT NULL,
    height DOUBLE PRECISION NOT NULL,
    color JSONB NOT NULL,
    texture TEXT NOT NULL,
    attributes JSONB NOT NULL,
    UNIQUE (version_id, client_id)
);

CREATE TABLE IF NOT EXISTS articles (
    id UUID PRIMARY KEY,
    version_id UUID NOT NULL REFERENCES versions(id),
    client_id TEXT NOT NULL,
    payload JSONB NOT NULL,
    UNIQUE (version_id, client_id)
);

CREATE TABLE IF NOT EXISTS share_tokens (
    id UUID PRIMARY KEY,
    project_id UUID NOT NULL REFERENCES projects(id),
    version_id UUID NOT NULL REFERENCES versions(id),
    token_hash TEXT NOT NULL UNIQUE,
    scope TEXT NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL,
    max_views BIGINT,
    views_count BIGINT NOT NULL DEFAULT 0,
    revoked_at TIMESTAMPTZ,
    created_by TEXT NOT NULL,
    created_on TIMESTAMPTZ NOT NULL
);
"#;

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/floorplan".to_string()),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            max_lifetime_secs: std::env::var("DB_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// PostgreSQL store.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(PostgresTx {
            tx: self.pool.begin().await?,
        })
    }
}

/// One PostgreSQL transaction.
pub struct PostgresTx {
    tx: sqlx::Transaction<'static, sqlx::Postgres>,
}

fn parse_version_row(row: &PgRow) -> Result<Version, sqlx::Error> {
    let major: i32 = row.try_get("major")?;
    let minor: i32 = row.try_get("minor")?;
    Ok(Version {
        id: VersionId::from_uuid(row.try_get("id")?),
        project_id: ProjectId::from_uuid(row.try_get("project_id")?),
        number: VersionNumber {
            major: major as u32,
            minor: minor as u32,
        },
        created_on: row.try_get("created_on")?,
        last_modified: row.try_get("last_modified")?,
        created_by: row.try_get("created_by")?,
        plan_image_url: row.try_get("plan_image_url")?,
    })
}

fn parse_point_row(row: &PgRow) -> Result<Point, sqlx::Error> {
    Ok(Point {
        persisted_id: PersistedId::from_uuid(row.try_get("id")?),
        client_id: row.try_get("client_id")?,
        x: row.try_get("x")?,
        y: row.try_get("y")?,
        z: row.try_get("z")?,
        rotation: row.try_get("rotation")?,
        snap_angle: row.try_get("snap_angle")?,
    })
}

fn parse_wall_row(row: &PgRow) -> Result<Wall, StoreError> {
    let color: serde_json::Value = row.try_get("color").map_err(StoreError::from)?;
    let attributes: serde_json::Value = row.try_get("attributes").map_err(StoreError::from)?;
    Ok(Wall {
        persisted_id: PersistedId::from_uuid(row.try_get("id").map_err(StoreError::from)?),
        client_id: row.try_get("client_id").map_err(StoreError::from)?,
        start_point_id: PersistedId::from_uuid(
            row.try_get("startpointid").map_err(StoreError::from)?,
        ),
        end_point_id: PersistedId::from_uuid(row.try_get("endpointid").map_err(StoreError::from)?),
        length: row.try_get("length").map_err(StoreError::from)?,
        rotation: row.try_get("rotation").map_err(StoreError::from)?,
        thickness: row.try_get("thickness").map_err(StoreError::from)?,
        height: row.try_get("height").map_err(StoreError::from)?,
        color: serde_json::from_value::<Color>(color)
            .map_err(|e| StoreError::Backend(format!("malformed color blob: {e}")))?,
        texture: row.try_get("texture").map_err(StoreError::from)?,
        attributes: serde_json::from_value(attributes)
            .map_err(|e| StoreError::Backend(format!("malformed attributes blob: {e}")))?,
    })
}

/// Serialize an article to the legacy JSON blob shape.
fn article_payload_blob(article: &Article) -> Result<serde_json::Value, StoreError> {
    let payload = ArticlePayload {
        position: article.position,
        rotation: article.rotation,
        wall_id: article.wall_id.map(|id| id.to_string()),
        reference_point_id: article.reference_point_id.map(|id| id.to_string()),
        display: article.display.clone(),
    };
    serde_json::to_value(&payload)
        .map_err(|e| StoreError::Backend(format!("article payload serialization: {e}")))
}

fn parse_article_row(row: &PgRow) -> Result<Article, StoreError> {
    let blob: serde_json::Value = row.try_get("payload").map_err(StoreError::from)?;
    let payload: ArticlePayload = serde_json::from_value(blob)
        .map_err(|e| StoreError::Backend(format!("malformed article blob: {e}")))?;
    let parse_ref = |s: &Option<String>| -> Result<Option<PersistedId>, StoreError> {
        s.as_deref()
            .map(|raw| {
                Uuid::parse_str(raw)
                    .map(PersistedId::from_uuid)
                    .map_err(|e| StoreError::Backend(format!("malformed article reference: {e}")))
            })
            .transpose()
    };
    Ok(Article {
        persisted_id: PersistedId::from_uuid(row.try_get("id").map_err(StoreError::from)?),
        client_id: row.try_get("client_id").map_err(StoreError::from)?,
        position: payload.position,
        rotation: payload.rotation,
        wall_id: parse_ref(&payload.wall_id)?,
        reference_point_id: parse_ref(&payload.reference_point_id)?,
        display: payload.display,
    })
}

fn parse_share_row(row: &PgRow) -> Result<ShareToken, StoreError> {
    let scope: String = row.try_get("scope").map_err(StoreError::from)?;
    let scope = match scope.as_str() {
        "view-only" => ShareScope::ViewOnly,
        other => return Err(StoreError::Backend(format!("unknown share scope: {other}"))),
    };
    let max_views: Option<i64> = row.try_get("max_views").map_err(StoreError::from)?;
    let views_count: i64 = row.try_get("views_count").map_err(StoreError::from)?;
    Ok(ShareToken {
        id: ShareId::from_uuid(row.try_get("id").map_err(StoreError::from)?),
        project_id: ProjectId::from_uuid(row.try_get("project_id").map_err(StoreError::from)?),
        version_id: VersionId::from_uuid(row.try_get("version_id").map_err(StoreError::from)?),
        token_hash: row.try_get("token_hash").map_err(StoreError::from)?,
        scope,
        expires_at: row.try_get("expires_at").map_err(StoreError::from)?,
        max_views: max_views.map(|v| v as u32),
        views_count: views_count as u32,
        revoked_at: row.try_get("revoked_at").map_err(StoreError::from)?,
        created_by: row.try_get("created_by").map_err(StoreError::from)?,
        created_on: row.try_get("created_on").map_err(StoreError::from)?,
    })
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn insert_project(&mut self, project: &Project) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO projects (id, owner_id, name, created_on) VALUES ($1, $2, $3, $4)",
        )
        .bind(project.id.as_uuid())
        .bind(&project.owner_id)
        .bind(&project.name)
        .bind(project.created_on)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn project(&mut self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query("SELECT id, owner_id, name, created_on FROM projects WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(|r| {
            Ok(Project {
                id: ProjectId::from_uuid(r.try_get("id")?),
                owner_id: r.try_get("owner_id")?,
                name: r.try_get("name")?,
                created_on: r.try_get("created_on")?,
            })
        })
        .transpose()
        .map_err(|e: sqlx::Error| e.into())
    }

    async fn delete_project(&mut self, id: ProjectId) -> Result<(), StoreError> {
        // Dependents first, matching the reconciliation deletion order.
        for table in ["articles", "walls", "points"] {
            sqlx::query(&format!(
                "DELETE FROM {table} WHERE version_id IN (SELECT id FROM versions WHERE project_id = $1)"
            ))
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        }
        sqlx::query("DELETE FROM share_tokens WHERE project_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM versions WHERE project_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_version(&mut self, version: &Version) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO versions
                (id, project_id, major, minor, created_on, last_modified, created_by, plan_image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(version.id.as_uuid())
        .bind(version.project_id.as_uuid())
        .bind(version.number.major as i32)
        .bind(version.number.minor as i32)
        .bind(version.created_on)
        .bind(version.last_modified)
        .bind(&version.created_by)
        .bind(&version.plan_image_url)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn version(&mut self, id: VersionId) -> Result<Option<Version>, StoreError> {
        let row = sqlx::query("SELECT * FROM versions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(|r| parse_version_row(&r))
            .transpose()
            .map_err(|e| e.into())
    }

    async fn latest_version(
        &mut self,
        project_id: ProjectId,
    ) -> Result<Option<Version>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM versions WHERE project_id = $1 ORDER BY major DESC, minor DESC LIMIT 1",
        )
        .bind(project_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(|r| parse_version_row(&r))
            .transpose()
            .map_err(|e| e.into())
    }

    async fn touch_version(&mut self, id: VersionId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE versions SET last_modified = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("version {id}")));
        }
        Ok(())
    }

    async fn points_by_version(
        &mut self,
        version_id: VersionId,
    ) -> Result<Vec<Point>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM points WHERE version_id = $1 ORDER BY client_id")
                .bind(version_id.as_uuid())
                .fetch_all(&mut *self.tx)
                .await?;
        rows.iter()
            .map(|r| parse_point_row(r).map_err(|e| e.into()))
            .collect()
    }

    async fn find_point(
        &mut self,
        version_id: VersionId,
        client_id: &str,
    ) -> Result<Option<Point>, StoreError> {
        let row = sqlx::query("SELECT * FROM points WHERE version_id = $1 AND client_id = $2")
            .bind(version_id.as_uuid())
            .bind(client_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(|r| parse_point_row(&r))
            .transpose()
            .map_err(|e| e.into())
    }

    async fn insert_point(
        &mut self,
        version_id: VersionId,
        point: &Point,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO points (id, version_id, client_id, x, y, z, rotation, snap_angle)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(point.persisted_id.as_uuid())
        .bind(version_id.as_uuid())
        .bind(&point.client_id)
        .bind(point.x)
        .bind(point.y)
        .bind(point.z)
        .bind(point.rotation)
        .bind(point.snap_angle)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_point(&mut self, point: &Point) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE points SET x = $2, y = $3, z = $4, rotation = $5, snap_angle = $6 WHERE id = $1",
        )
        .bind(point.persisted_id.as_uuid())
        .bind(point.x)
        .bind(point.y)
        .bind(point.z)
        .bind(point.rotation)
        .bind(point.snap_angle)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("point {}", point.persisted_id)));
        }
        Ok(())
    }

    async fn delete_point(&mut self, persisted_id: PersistedId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM points WHERE id = $1")
            .bind(persisted_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn walls_by_version(&mut self, version_id: VersionId) -> Result<Vec<Wall>, StoreError> {
        let rows = sqlx::query("SELECT * FROM walls WHERE version_id = $1 ORDER BY client_id")
            .bind(version_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(parse_wall_row).collect()
    }

    async fn find_wall(
        &mut self,
        version_id: VersionId,
        client_id: &str,
    ) -> Result<Option<Wall>, StoreError> {
        let row = sqlx::query("SELECT * FROM walls WHERE version_id = $1 AND client_id = $2")
            .bind(version_id.as_uuid())
            .bind(client_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(parse_wall_row).transpose()
    }

    async fn insert_wall(&mut self, version_id: VersionId, wall: &Wall) -> Result<(), StoreError> {
        let color = serde_json::to_value(&wall.color)
            .map_err(|e| StoreError::Backend(format!("color serialization: {e}")))?;
        let attributes = serde_json::to_value(&wall.attributes)
            .map_err(|e| StoreError::Backend(format!("attributes serialization: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO walls
                (id, version_id, client_id, startpointid, endpointid,
                 length, rotation, thickness, height, color, texture, attributes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(wall.persisted_id.as_uuid())
        .bind(version_id.as_uuid())
        .bind(&wall.client_id)
        .bind(wall.start_point_id.as_uuid())
        .bind(wall.end_point_id.as_uuid())
        .bind(wall.length)
        .bind(wall.rotation)
        .bind(wall.thickness)
        .bind(wall.height)
        .bind(color)
        .bind(&wall.texture)
        .bind(attributes)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_wall(&mut self, wall: &Wall) -> Result<(), StoreError> {
        let color = serde_json::to_value(&wall.color)
            .map_err(|e| StoreError::Backend(format!("color serialization: {e}")))?;
        let attributes = serde_json::to_value(&wall.attributes)
            .map_err(|e| StoreError::Backend(format!("attributes serialization: {e}")))?;
        let result = sqlx::query(
            r#"
            UPDATE walls SET startpointid = $2, endpointid = $3, length = $4, rotation = $5,
                             thickness = $6, height = $7, color = $8, texture = $9, attributes = $10
            WHERE id = $1
            "#,
        )
        .bind(wall.persisted_id.as_uuid())
        .bind(wall.start_point_id.as_uuid())
        .bind(wall.end_point_id.as_uuid())
        .bind(wall.length)
        .bind(wall.rotation)
        .bind(wall.thickness)
        .bind(wall.height)
        .bind(color)
        .bind(&wall.texture)
        .bind(attributes)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("wall {}", wall.persisted_id)));
        }
        Ok(())
    }

    async fn delete_wall(&mut self, persisted_id: PersistedId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM walls WHERE id = $1")
            .bind(persisted_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn articles_by_version(
        &mut self,
        version_id: VersionId,
    ) -> Result<Vec<Article>, StoreError> {
        let rows = sqlx::query("SELECT * FROM articles WHERE version_id = $1 ORDER BY client_id")
            .bind(version_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(parse_article_row).collect()
    }

    async fn find_article(
        &mut self,
        version_id: VersionId,
        client_id: &str,
    ) -> Result<Option<Article>, StoreError> {
        let row = sqlx::query("SELECT * FROM articles WHERE version_id = $1 AND client_id = $2")
            .bind(version_id.as_uuid())
            .bind(client_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(parse_article_row).transpose()
    }

    async fn insert_article(
        &mut self,
        version_id: VersionId,
        article: &Article,
    ) -> Result<(), StoreError> {
        let blob = article_payload_blob(article)?;
        sqlx::query("INSERT INTO articles (id, version_id, client_id, payload) VALUES ($1, $2, $3, $4)")
            .bind(article.persisted_id.as_uuid())
            .bind(version_id.as_uuid())
            .bind(&article.client_id)
            .bind(blob)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_article(&mut self, article: &Article) -> Result<(), StoreError> {
        let blob = article_payload_blob(article)?;
        let result = sqlx::query("UPDATE articles SET payload = $2 WHERE id = $1")
            .bind(article.persisted_id.as_uuid())
            .bind(blob)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!(
                "article {}",
                article.persisted_id
            )));
        }
        Ok(())
    }

    async fn delete_article(&mut self, persisted_id: PersistedId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(persisted_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_share(&mut self, share: &ShareToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO share_tokens
                (id, project_id, version_id, token_hash, scope, expires_at,
                 max_views, views_count, revoked_at, created_by, created_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(share.id.as_uuid())
        .bind(share.project_id.as_uuid())
        .bind(share.version_id.as_uuid())
        .bind(&share.token_hash)
        .bind(share.scope.to_string())
        .bind(share.expires_at)
        .bind(share.max_views.map(|v| v as i64))
        .bind(share.views_count as i64)
        .bind(share.revoked_at)
        .bind(&share.created_by)
        .bind(share.created_on)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn share(&mut self, id: ShareId) -> Result<Option<ShareToken>, StoreError> {
        let row = sqlx::query("SELECT * FROM share_tokens WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(parse_share_row).transpose()
    }

    async fn share_by_hash(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<ShareToken>, StoreError> {
        let row = sqlx::query("SELECT * FROM share_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(parse_share_row).transpose()
    }

    async fn update_share(&mut self, share: &ShareToken) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE share_tokens
            SET expires_at = $2, max_views = $3, views_count = $4, revoked_at = $5
            WHERE id = $1
            "#,
        )
        .bind(share.id.as_uuid())
        .bind(share.expires_at)
        .bind(share.max_views.map(|v| v as i64))
        .bind(share.views_count as i64)
        .bind(share.revoked_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("share {}", share.id)));
        }
        Ok(())
    }

    async fn increment_share_views(&mut self, id: ShareId) -> Result<bool, StoreError> {
        // Single conditional update: concurrent validations cannot overrun
        // the view budget.
        let result = sqlx::query(
            r#"
            UPDATE share_tokens
            SET views_count = views_count + 1
            WHERE id = $1 AND (max_views IS NULL OR views_count < max_views)
            "#,
        )
        .bind(id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;

    #[test]
    fn test_article_blob_roundtrip() {
        let wall_id = PersistedId::new();
        let article = Article {
            persisted_id: PersistedId::new(),
            client_id: "door-1".to_string(),
            position: Vec3::new(1.0, 0.0, 2.0),
            rotation: 45.0,
            wall_id: Some(wall_id),
            reference_point_id: None,
            display: Default::default(),
        };
        let blob = article_payload_blob(&article).unwrap();
        assert_eq!(blob["wall_id"], wall_id.to_string());
        assert_eq!(blob["position"]["z"], 2.0);

        let payload: ArticlePayload = serde_json::from_value(blob).unwrap();
        assert_eq!(payload.wall_id.as_deref(), Some(wall_id.to_string().as_str()));
    }

    #[test]
    fn test_config_defaults() {
        let config = PostgresConfig {
            database_url: "postgresql://localhost/test".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 10,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        };
        assert_eq!(config.max_connections, 10);
    }
}
