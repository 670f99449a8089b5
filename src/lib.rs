//! # floorplan-kernel
//!
//! Graph reconciliation and versioning for floorplan projects.
//!
//! The kernel answers one question:
//!
//! > Given a client's full-graph snapshot of a floorplan, how does persisted
//! > state converge to it without ever breaking referential integrity?
//!
//! ## Core Contract
//!
//! 1. Reconcile a desired graph (points, walls, articles) into one version's
//!    persisted state: classify identities, delete orphans, upsert, resolve
//!    references; the pass is idempotent by construction
//! 2. Manage the version lifecycle: `"major.minor"` numbering, creation,
//!    whole-graph cloning with preserved client ids and fresh persisted ids
//! 3. Import scanned-room geometry (4x4 transforms) into the same graph model
//! 4. Gate shared read-only snapshots behind expiring, view-limited tokens
//!
//! ## Architecture
//!
//! ```text
//! DesiredGraph → Reconciliation Engine → Store (Postgres or Memory)
//!                        ↑                      ↑
//!     Geometry Importer ─┘    VersionManager ───┤
//!                                 ShareGuard ───┘
//! ```
//!
//! ## Integrity Guarantees
//!
//! - Every wall endpoint and article attachment resolves within its version
//! - Replaying a desired graph changes nothing: persisted ids are stable
//! - Each operation is one store transaction; errors roll back completely

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod importer;
pub mod lifecycle;
pub mod reconcile;
pub mod share;
pub mod store;
pub mod types;

// Re-exports
pub use error::KernelError;
pub use importer::{
    import_scan, DoorDimensions, ScannedDoor, ScannedRoom, ScannedWall, WallDimensions,
};
pub use lifecycle::VersionManager;
pub use reconcile::{reconcile, KindCounts, ReconciliationResult};
pub use share::{ShareContext, ShareGuard};
pub use store::{InMemoryStore, Store, StoreError, StoreTx};
#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresStore};
pub use types::{
    Article, ArticleDisplay, ArticleInput, ArticlePayload, Color, DesiredGraph, EntityRef,
    GraphSnapshot, PersistedId, Point, PointInput, Project, ProjectId, ShareId, ShareScope,
    ShareState, ShareToken, StructuredColor, Vec3, Version, VersionId, VersionNumber, Wall,
    WallInput,
};

/// Schema version for all kernel types.
/// Increment on breaking changes to any persisted shape.
pub const KERNEL_SCHEMA_VERSION: &str = "1.0.0";
