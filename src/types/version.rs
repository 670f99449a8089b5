//! Projects and versions.
//!
//! A project owns 1..N versions; each version exclusively owns its graph.
//! Version numbers are `"major.minor"` strings that only ever advance by
//! minor bumps. No semantic-versioning semantics beyond the counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{ProjectId, VersionId};
use crate::error::KernelError;

/// A `"major.minor"` version number, strictly increasing per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionNumber {
    /// Major counter (never bumped automatically).
    pub major: u32,
    /// Minor counter, bumped once per save/clone.
    pub minor: u32,
}

impl VersionNumber {
    /// The first version of a project: `"1.0"`.
    pub fn first() -> Self {
        Self { major: 1, minor: 0 }
    }

    /// The next version: minor counter incremented, major unchanged.
    pub fn next(&self) -> Self {
        Self {
            major: self.major,
            minor: self.minor + 1,
        }
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for VersionNumber {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || KernelError::validation(format!("malformed version number: {s:?}"));
        let (major, minor) = s.split_once('.').ok_or_else(malformed)?;
        Ok(Self {
            major: major.parse().map_err(|_| malformed())?,
            minor: minor.parse().map_err(|_| malformed())?,
        })
    }
}

impl Serialize for VersionNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A project: the ownership root for versions and share tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier.
    pub id: ProjectId,
    /// Owner principal. Share issuance requires this to match the caller.
    pub owner_id: String,
    /// Display name.
    pub name: String,
    /// Creation timestamp.
    pub created_on: DateTime<Utc>,
}

impl Project {
    /// Create a new project owned by the given principal.
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            owner_id: owner_id.into(),
            name: name.into(),
            created_on: Utc::now(),
        }
    }
}

/// A version: immutable identity, mutable contained graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Unique identifier; never changes once allocated.
    pub id: VersionId,
    /// Owning project.
    pub project_id: ProjectId,
    /// `"major.minor"` number, unique and increasing within the project.
    pub number: VersionNumber,
    /// Creation timestamp.
    pub created_on: DateTime<Utc>,
    /// Timestamp of the last successful reconciliation.
    pub last_modified: DateTime<Utc>,
    /// Author who created this version.
    pub created_by: String,
    /// Optional rendered plan image.
    pub plan_image_url: Option<String>,
}

impl Version {
    /// Allocate a new version row for a project.
    pub fn new(project_id: ProjectId, number: VersionNumber, created_by: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: VersionId::new(),
            project_id,
            number,
            created_on: now,
            last_modified: now,
            created_by: created_by.into(),
            plan_image_url: None,
        }
    }
}
