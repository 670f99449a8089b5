//! Core types for the floorplan kernel.

pub mod article;
pub mod graph;
pub mod ids;
pub mod point;
pub mod share;
pub mod version;
pub mod wall;

pub use article::{Article, ArticleDisplay, ArticleInput, ArticlePayload, Vec3};
pub use graph::{DesiredGraph, GraphSnapshot};
pub use ids::{EntityRef, PersistedId, ProjectId, ShareId, VersionId};
pub use point::{Point, PointInput};
pub use share::{
    ShareScope, ShareState, ShareToken, DEFAULT_SHARE_MAX_VIEWS, DEFAULT_SHARE_TTL_DAYS,
};
pub use version::{Project, Version, VersionNumber};
pub use wall::{Color, StructuredColor, Wall, WallInput};
