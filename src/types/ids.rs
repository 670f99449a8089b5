//! Identifier types for the floorplan kernel.
//!
//! Every persisted entity carries two identities:
//!
//! - a **persisted id** ([`PersistedId`]) assigned by the store, stable for the
//!   lifetime of the row, never used by callers for matching;
//! - a **client id** (a caller-chosen string) that names the same logical
//!   entity across repeated saves.
//!
//! Legacy payloads sometimes omit the client id and reuse an old persisted id
//! (a UUID) or an editor-local literal such as `line-3`. [`EntityRef`]
//! classifies an incoming identifier exactly once at the boundary; downstream
//! code only ever sees the resolved key string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// Unique identifier for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

/// Unique identifier for a version of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(Uuid);

/// Store-assigned identifier for a persisted Point/Wall/Article row.
///
/// Opaque and internal: never accepted as a matching key from callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedId(Uuid);

/// Unique identifier for a share token row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareId(Uuid);

macro_rules! uuid_id {
    ($name:ident) => {
        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a UUID string.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(ProjectId);
uuid_id!(VersionId);
uuid_id!(PersistedId);
uuid_id!(ShareId);

/// Classified client-side reference to a logical entity.
///
/// Resolution happens once, at the reconciliation boundary:
///
/// 1. An explicit `client_id` field wins and becomes [`EntityRef::ClientId`].
/// 2. Otherwise, if the payload's `id` field matches a recognized legacy
///    pattern (`line-<n>`, `point-<n>`, `wall-<n>`, `door-<n>`,
///    `article-<n>`) or parses as a UUID, that id is adopted as the client
///    identity ([`EntityRef::LegacyId`]).
/// 3. Anything else has no derivable identity and is skipped by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// Explicit caller-assigned client id.
    ClientId(String),
    /// Legacy payload id adopted as the client identity.
    LegacyId(String),
}

fn legacy_pattern() -> &'static regex_lite::Regex {
    static PATTERN: OnceLock<regex_lite::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex_lite::Regex::new(r"^(line|point|wall|door|article)-\d+$")
            .expect("legacy id pattern is valid")
    })
}

impl EntityRef {
    /// Classify an incoming `(id, client_id)` pair.
    ///
    /// Returns `None` when no identity can be derived; the entity should be
    /// skipped with a warning, not rejected.
    pub fn classify(id: Option<&str>, client_id: Option<&str>) -> Option<Self> {
        if let Some(client_id) = client_id {
            if !client_id.is_empty() {
                return Some(Self::ClientId(client_id.to_string()));
            }
        }
        let id = id.filter(|s| !s.is_empty())?;
        if legacy_pattern().is_match(id) || Uuid::parse_str(id).is_ok() {
            return Some(Self::LegacyId(id.to_string()));
        }
        None
    }

    /// The resolved client-identity string.
    pub fn key(&self) -> &str {
        match self {
            Self::ClientId(s) | Self::LegacyId(s) => s,
        }
    }

    /// Whether this reference was recovered from a legacy payload id.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::LegacyId(_))
    }

    /// Consume into the resolved client-identity string.
    pub fn into_key(self) -> String {
        match self {
            Self::ClientId(s) | Self::LegacyId(s) => s,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
