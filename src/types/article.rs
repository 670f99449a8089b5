//! Article entities: doors, windows and custom objects attached to the graph.
//!
//! Articles embed a structured payload (position, rotation, optional wall and
//! reference-point attachments, display metadata). Stores persist the payload
//! as a single JSON blob for compatibility with existing data.

use serde::{Deserialize, Serialize};

use super::ids::PersistedId;

/// 3D position embedded in an article payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X coordinate (meters).
    pub x: f64,
    /// Y coordinate (meters).
    pub y: f64,
    /// Z coordinate (meters).
    pub z: f64,
}

impl Vec3 {
    /// Create a position.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Display metadata carried alongside an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleDisplay {
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Kind tag ("door", "window", custom).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_type: Option<String>,
    /// Width (meters).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Height (meters).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

/// A persisted article, scoped to one version.
///
/// Invariant: if `wall_id` is set it references a wall in the same version;
/// if `reference_point_id` is set it references a point in the same version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Store-assigned identifier.
    pub persisted_id: PersistedId,
    /// Caller-assigned identity.
    pub client_id: String,
    /// World-space position.
    pub position: Vec3,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Persisted id of the wall this article is attached to, if any.
    pub wall_id: Option<PersistedId>,
    /// Persisted id of the reference point, if any.
    pub reference_point_id: Option<PersistedId>,
    /// Display metadata.
    pub display: ArticleDisplay,
}

/// The embedded payload of a client-submitted article.
///
/// Attachment references are client-space strings here; the reconciliation
/// engine translates them to persisted ids before writing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticlePayload {
    /// World-space position.
    #[serde(default)]
    pub position: Vec3,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Client-space reference to the attached wall.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_id: Option<String>,
    /// Client-space reference to the reference point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_point_id: Option<String>,
    /// Display metadata.
    #[serde(default, flatten)]
    pub display: ArticleDisplay,
}

/// A client-submitted article, before identity classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleInput {
    /// Raw payload id (may be a legacy persisted id or editor literal).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Explicit client identity, if assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Embedded structured payload.
    #[serde(default)]
    pub payload: ArticlePayload,
}

impl ArticleInput {
    /// Create an article input with an explicit client id.
    pub fn new(client_id: impl Into<String>, payload: ArticlePayload) -> Self {
        Self {
            id: None,
            client_id: Some(client_id.into()),
            payload,
        }
    }
}

impl Article {
    /// Copy mutable fields from a desired article onto this persisted row.
    ///
    /// Attachment references must already be translated to persisted space.
    pub fn apply(
        &mut self,
        desired: &ArticlePayload,
        wall_id: Option<PersistedId>,
        reference_point_id: Option<PersistedId>,
    ) {
        self.position = desired.position;
        self.rotation = desired.rotation;
        self.wall_id = wall_id;
        self.reference_point_id = reference_point_id;
        self.display = desired.display.clone();
    }
}
