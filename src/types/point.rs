//! Point entities: the nodes of the floorplan graph.

use serde::{Deserialize, Serialize};

use super::ids::PersistedId;

/// A persisted point, scoped to one version.
///
/// Invariant: `(client_id, version_id)` is unique; the store enforces this by
/// matching on `client_id` during upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Store-assigned identifier, stable across saves.
    pub persisted_id: PersistedId,
    /// Caller-assigned identity, stable across edits of the same logical point.
    pub client_id: String,
    /// X coordinate (meters).
    pub x: f64,
    /// Y coordinate (meters).
    pub y: f64,
    /// Z coordinate (meters).
    pub z: f64,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Snap angle in degrees for editor snapping.
    pub snap_angle: f64,
}

/// A client-submitted point, before identity classification.
///
/// `client_id` is the preferred identity; legacy payloads carry only `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointInput {
    /// Raw payload id (may be a legacy persisted id or editor literal).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Explicit client identity, if the caller assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// X coordinate (meters).
    #[serde(default)]
    pub x: f64,
    /// Y coordinate (meters).
    #[serde(default)]
    pub y: f64,
    /// Z coordinate (meters).
    #[serde(default)]
    pub z: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Snap angle in degrees.
    #[serde(default)]
    pub snap_angle: f64,
}

impl PointInput {
    /// Create a point input at the given coordinates with an explicit client id.
    pub fn at(client_id: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            id: None,
            client_id: Some(client_id.into()),
            x,
            y,
            z,
            rotation: 0.0,
            snap_angle: 0.0,
        }
    }
}

impl Point {
    /// Copy the mutable fields of a desired point onto this persisted row.
    ///
    /// `persisted_id` and `client_id` stay untouched.
    pub fn apply(&mut self, desired: &PointInput) {
        self.x = desired.x;
        self.y = desired.y;
        self.z = desired.z;
        self.rotation = desired.rotation;
        self.snap_angle = desired.snap_angle;
    }
}
