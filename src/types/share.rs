//! Share tokens: time- and view-limited read access to one version's graph.
//!
//! ## Security model
//!
//! The bearer secret is 256 bits from the OS RNG, handed to the caller once
//! and never persisted. The store keeps only `sha256(secret)`; validation
//! hashes the presented secret and looks the row up by hash. Terminal states
//! (`Expired`, `Revoked`, `ViewLimitReached`) never transition back to
//! `Active`; a dead token is soft-deleted, not removed.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::ids::{ProjectId, ShareId, VersionId};

/// Access scope granted by a share token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareScope {
    /// Read-only snapshot access (the only scope currently issued).
    #[default]
    ViewOnly,
}

impl fmt::Display for ShareScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ViewOnly => write!(f, "view-only"),
        }
    }
}

/// Lifecycle state derived from a token row at a point in time.
///
/// `Active -> {Expired, Revoked, ViewLimitReached}`; all targets terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareState {
    /// Token grants access.
    Active,
    /// `expires_at` has passed.
    Expired,
    /// Owner revoked the token.
    Revoked,
    /// `views_count` reached `max_views`.
    ViewLimitReached,
}

/// Default validity window for newly issued tokens.
pub const DEFAULT_SHARE_TTL_DAYS: i64 = 7;

/// Default view budget for newly issued tokens.
pub const DEFAULT_SHARE_MAX_VIEWS: u32 = 50;

/// A persisted share token row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareToken {
    /// Unique identifier.
    pub id: ShareId,
    /// Owning project.
    pub project_id: ProjectId,
    /// The version this token exposes.
    pub version_id: VersionId,
    /// Hex-encoded SHA-256 of the bearer secret. The secret itself is never stored.
    pub token_hash: String,
    /// Granted scope.
    pub scope: ShareScope,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// View budget; `None` means unlimited.
    pub max_views: Option<u32>,
    /// Views consumed so far.
    pub views_count: u32,
    /// Set when the owner revokes the token (terminal, soft delete).
    pub revoked_at: Option<DateTime<Utc>>,
    /// Principal that issued the token.
    pub created_by: String,
    /// Issuance timestamp.
    pub created_on: DateTime<Utc>,
}

impl ShareToken {
    /// Issue a fresh token for a project/version pair.
    ///
    /// Returns the bearer secret (hex, 64 chars) together with the row to
    /// persist. Defaults: expiry now + 7 days, 50 views.
    pub fn issue(
        project_id: ProjectId,
        version_id: VersionId,
        created_by: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        max_views: Option<u32>,
    ) -> (String, Self) {
        let secret = generate_secret();
        let now = Utc::now();
        let token = Self {
            id: ShareId::new(),
            project_id,
            version_id,
            token_hash: hash_secret(&secret),
            scope: ShareScope::ViewOnly,
            expires_at: expires_at.unwrap_or(now + Duration::days(DEFAULT_SHARE_TTL_DAYS)),
            max_views: Some(max_views.unwrap_or(DEFAULT_SHARE_MAX_VIEWS)),
            views_count: 0,
            revoked_at: None,
            created_by: created_by.into(),
            created_on: now,
        };
        (secret, token)
    }

    /// Derive the lifecycle state at `now`.
    ///
    /// Revocation dominates expiry, which dominates the view limit; once any
    /// terminal condition holds the token never becomes active again.
    pub fn state(&self, now: DateTime<Utc>) -> ShareState {
        if self.revoked_at.is_some() {
            return ShareState::Revoked;
        }
        if now >= self.expires_at {
            return ShareState::Expired;
        }
        if let Some(max) = self.max_views {
            if self.views_count >= max {
                return ShareState::ViewLimitReached;
            }
        }
        ShareState::Active
    }

    /// Mark the token revoked at `now`. Idempotent: an already-revoked token
    /// keeps its original revocation instant.
    pub fn revoke(&mut self, now: DateTime<Utc>) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(now);
        }
    }
}

/// Generate a 256-bit bearer secret, hex-encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One-way hash of a bearer secret, as persisted in `token_hash`.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
