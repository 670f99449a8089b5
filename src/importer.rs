//! Geometry importer: converts scanned-room transforms into graph entities.
//!
//! Scanner output describes each wall as a 4x4 column-major transform plus
//! local-frame dimensions, and each door as its own transform plus a width/
//! height pair. The importer is a pure function from that description to a
//! [`DesiredGraph`]; it never talks to storage.
//!
//! ## Algorithm
//!
//! 1. Multiply each wall transform by the local points `(0,0,0,1)` and
//!    `(length,0,0,1)` to obtain world-space endpoints.
//! 2. Derive the wall's rotation about the vertical axis as
//!    `atan2(-M[8], M[0])`, in degrees.
//! 3. Deduplicate endpoints across all walls: key each point on its
//!    coordinates quantized to three decimals and assign sequential temp
//!    ids. Points keep their raw first-occurrence coordinates.
//! 4. Read each door's translation from matrix components 12..14.
//! 5. Emit a neutral graph with temp ids in the `id` fields and `client_id`
//!    unset; a persisting caller adopts the temp ids via
//!    [`DesiredGraph::adopt_ids_as_client_ids`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::KernelError;
use crate::types::{
    ArticleDisplay, ArticleInput, ArticlePayload, DesiredGraph, PointInput, Vec3, WallInput,
};

/// Local-frame dimensions of a scanned wall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallDimensions {
    /// Length along the wall's local X axis (meters).
    pub length: f64,
    /// Height (meters).
    pub height: f64,
    /// Thickness (meters).
    pub thickness: f64,
}

/// Local-frame dimensions of a scanned door.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoorDimensions {
    /// Opening width (meters).
    pub width: f64,
    /// Opening height (meters).
    pub height: f64,
}

/// One scanned wall: a column-major 4x4 transform plus dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedWall {
    /// 16 floats, column-major.
    pub transform: Vec<f64>,
    /// Local-frame dimensions; absence is a validation error.
    #[serde(default)]
    pub dimensions: Option<WallDimensions>,
}

/// One scanned door.
///
/// Rotation is not derived from the scan transform and always imports as 0;
/// the scanner never provided a reliable convention for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedDoor {
    /// 16 floats, column-major.
    pub transform: Vec<f64>,
    /// Local-frame dimensions; absence is a validation error.
    #[serde(default)]
    pub dimensions: Option<DoorDimensions>,
}

/// A scanned room: the importer's input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScannedRoom {
    /// Scanned walls.
    #[serde(default)]
    pub walls: Vec<ScannedWall>,
    /// Scanned doors.
    #[serde(default)]
    pub doors: Vec<ScannedDoor>,
}

/// Multiply a column-major 4x4 matrix by a column vector.
fn transform_apply(m: &[f64], v: [f64; 4]) -> [f64; 4] {
    let mut result = [0.0; 4];
    for (i, out) in result.iter_mut().enumerate() {
        *out = m[i] * v[0] + m[i + 4] * v[1] + m[i + 8] * v[2] + m[i + 12] * v[3];
    }
    result
}

/// Rotation about the vertical axis, in degrees.
fn yaw_degrees(m: &[f64]) -> f64 {
    (-m[8]).atan2(m[0]).to_degrees()
}

/// Quantize a coordinate to thousandths, for keying only. Integer
/// thousandths avoid the `-0.000` formatting trap.
fn quantize(x: f64) -> i64 {
    (x * 1000.0).round() as i64
}

/// Deduplicating point collector: one temp id per quantized coordinate key.
#[derive(Debug, Default)]
struct PointPool {
    by_key: HashMap<String, usize>,
    points: Vec<PointInput>,
}

impl PointPool {
    /// Return the temp id for a world coordinate, inserting a new point the
    /// first time its quantized key is seen.
    ///
    /// The point keeps the raw first-occurrence coordinates; quantization is
    /// only the dedup key.
    fn intern(&mut self, x: f64, y: f64, z: f64) -> String {
        let key = format!("{}:{}:{}", quantize(x), quantize(y), quantize(z));
        if let Some(&index) = self.by_key.get(&key) {
            return (index + 1).to_string();
        }
        let index = self.points.len();
        self.by_key.insert(key, index);
        let temp_id = (index + 1).to_string();
        self.points.push(PointInput {
            id: Some(temp_id.clone()),
            client_id: None,
            x,
            y,
            z,
            rotation: 0.0,
            snap_angle: 0.0,
        });
        temp_id
    }
}

fn check_transform(transform: &[f64], what: &str, index: usize) -> Result<(), KernelError> {
    if transform.len() != 16 {
        return Err(KernelError::validation(format!(
            "{what} {index}: transform must have 16 entries, got {}",
            transform.len()
        )));
    }
    Ok(())
}

/// Convert a scanned room into a desired graph.
///
/// Fails with a [`KernelError::Validation`] naming the offending wall or
/// door index on a malformed transform or missing/non-positive dimensions;
/// no partial wall is ever emitted.
pub fn import_scan(room: &ScannedRoom) -> Result<DesiredGraph, KernelError> {
    let mut pool = PointPool::default();
    let mut walls = Vec::with_capacity(room.walls.len());

    for (index, wall) in room.walls.iter().enumerate() {
        check_transform(&wall.transform, "wall", index)?;
        let dims = wall.dimensions.ok_or_else(|| {
            KernelError::validation(format!("wall {index}: missing dimensions"))
        })?;
        if dims.length <= 0.0 || dims.height <= 0.0 || dims.thickness <= 0.0 {
            return Err(KernelError::validation(format!(
                "wall {index}: dimensions must be positive"
            )));
        }

        let start = transform_apply(&wall.transform, [0.0, 0.0, 0.0, 1.0]);
        let end = transform_apply(&wall.transform, [dims.length, 0.0, 0.0, 1.0]);
        let rotation = yaw_degrees(&wall.transform);

        let start_id = pool.intern(start[0], start[1], start[2]);
        let end_id = pool.intern(end[0], end[1], end[2]);

        walls.push(WallInput {
            id: Some((index + 1).to_string()),
            client_id: None,
            start_point_id: start_id,
            end_point_id: end_id,
            length: dims.length,
            rotation,
            thickness: dims.thickness,
            height: dims.height,
            color: Default::default(),
            texture: String::new(),
            attributes: Default::default(),
        });
    }

    let mut articles = Vec::with_capacity(room.doors.len());
    for (index, door) in room.doors.iter().enumerate() {
        check_transform(&door.transform, "door", index)?;
        let dims = door.dimensions.ok_or_else(|| {
            KernelError::validation(format!("door {index}: missing dimensions"))
        })?;
        if dims.width <= 0.0 || dims.height <= 0.0 {
            return Err(KernelError::validation(format!(
                "door {index}: dimensions must be positive"
            )));
        }

        articles.push(ArticleInput {
            id: Some((index + 1).to_string()),
            client_id: None,
            payload: ArticlePayload {
                position: Vec3::new(
                    door.transform[12],
                    door.transform[13],
                    door.transform[14],
                ),
                // Not derived from the scan transform; see ScannedDoor docs.
                rotation: 0.0,
                wall_id: None,
                reference_point_id: None,
                display: ArticleDisplay {
                    name: None,
                    article_type: Some("door".to_string()),
                    width: Some(dims.width),
                    height: Some(dims.height),
                },
            },
        });
    }

    tracing::debug!(
        walls = walls.len(),
        points = pool.points.len(),
        doors = articles.len(),
        "imported scanned room"
    );

    Ok(DesiredGraph {
        points: pool.points,
        walls,
        articles,
    })
}
