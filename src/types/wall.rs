//! Wall entities: the edges of the floorplan graph.
//!
//! A wall references two points. In client payloads the references are
//! client-space strings; in persisted rows they are store-assigned
//! [`PersistedId`]s that must resolve within the same version.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::PersistedId;

/// Wall color: either a bare hex string (`"#aabbcc"`) or a structured object.
///
/// Existing stored data contains both shapes, so serialization is untagged
/// and accepts either on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    /// Structured color components.
    Structured(StructuredColor),
    /// Hex string, with or without leading `#`.
    Hex(String),
}

/// Structured color components, 0-255 per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Optional alpha in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl Color {
    /// Render as a hex string regardless of representation.
    pub fn to_hex(&self) -> String {
        match self {
            Self::Hex(s) => {
                if s.starts_with('#') {
                    s.clone()
                } else {
                    format!("#{s}")
                }
            }
            Self::Structured(c) => format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::Hex("#ffffff".to_string())
    }
}

/// A persisted wall, scoped to one version.
///
/// Invariant: `start_point_id` and `end_point_id` resolve to points in the
/// same version as the wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    /// Store-assigned identifier.
    pub persisted_id: PersistedId,
    /// Caller-assigned identity.
    pub client_id: String,
    /// Persisted id of the start point.
    pub start_point_id: PersistedId,
    /// Persisted id of the end point.
    pub end_point_id: PersistedId,
    /// Wall length (meters).
    pub length: f64,
    /// Rotation about the vertical axis, degrees.
    pub rotation: f64,
    /// Wall thickness (meters).
    pub thickness: f64,
    /// Wall height (meters).
    pub height: f64,
    /// Wall color.
    pub color: Color,
    /// Texture name.
    pub texture: String,
    /// Free-form attributes (material, quantity, estimate...).
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// A client-submitted wall with client-space point references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallInput {
    /// Raw payload id (may be a legacy persisted id or editor literal).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Explicit client identity, if assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Client-space reference to the start point.
    pub start_point_id: String,
    /// Client-space reference to the end point.
    pub end_point_id: String,
    /// Wall length (meters).
    #[serde(default)]
    pub length: f64,
    /// Rotation about the vertical axis, degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Wall thickness (meters).
    #[serde(default)]
    pub thickness: f64,
    /// Wall height (meters).
    #[serde(default)]
    pub height: f64,
    /// Wall color (hex string or structured object).
    #[serde(default)]
    pub color: Color,
    /// Texture name.
    #[serde(default)]
    pub texture: String,
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl WallInput {
    /// Create a wall input between two client-space point references.
    pub fn between(
        client_id: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            client_id: Some(client_id.into()),
            start_point_id: start.into(),
            end_point_id: end.into(),
            length: 0.0,
            rotation: 0.0,
            thickness: 0.2,
            height: 2.5,
            color: Color::default(),
            texture: String::new(),
            attributes: BTreeMap::new(),
        }
    }
}

impl Wall {
    /// Copy mutable fields from a desired wall onto this persisted row.
    ///
    /// Point references must already be translated to persisted space.
    pub fn apply(&mut self, desired: &WallInput, start: PersistedId, end: PersistedId) {
        self.start_point_id = start;
        self.end_point_id = end;
        self.length = desired.length;
        self.rotation = desired.rotation;
        self.thickness = desired.thickness;
        self.height = desired.height;
        self.color = desired.color.clone();
        self.texture = desired.texture.clone();
        self.attributes = desired.attributes.clone();
    }
}
