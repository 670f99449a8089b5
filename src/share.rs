//! Share token guard: issuance, validation and revocation of read tokens.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::KernelError;
use crate::reconcile::load_graph;
use crate::store::{Store, StoreTx};
use crate::types::share::hash_secret;
use crate::types::{
    GraphSnapshot, ProjectId, ShareId, ShareState, ShareToken, VersionId,
};

/// What a successfully validated share token grants.
#[derive(Debug, Clone)]
pub struct ShareContext {
    /// The token row after its view increment.
    pub share: ShareToken,
    /// Read-only snapshot of the shared version's graph.
    pub graph: GraphSnapshot,
}

/// Gates access to shared read-only snapshots via expiring, view-limited
/// tokens.
pub struct ShareGuard<S: Store> {
    store: Arc<S>,
}

impl<S: Store> ShareGuard<S> {
    /// Create a guard over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Issue a share token for a project/version pair.
    ///
    /// Only the project owner may issue; the version must belong to the
    /// project. Returns the bearer secret (shown once, never persisted)
    /// together with the stored row.
    pub async fn issue(
        &self,
        project_id: ProjectId,
        version_id: VersionId,
        caller_id: &str,
        expires_at: Option<DateTime<Utc>>,
        max_views: Option<u32>,
    ) -> Result<(String, ShareToken), KernelError> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<(String, ShareToken), KernelError> = async {
            let project = tx
                .project(project_id)
                .await?
                .ok_or_else(|| KernelError::not_found(format!("project {project_id}")))?;
            if project.owner_id != caller_id {
                return Err(KernelError::forbidden(
                    "only the project owner may issue share tokens",
                ));
            }
            let version = tx
                .version(version_id)
                .await?
                .ok_or_else(|| KernelError::not_found(format!("version {version_id}")))?;
            if version.project_id != project_id {
                return Err(KernelError::validation(format!(
                    "version {version_id} does not belong to project {project_id}"
                )));
            }

            let (secret, share) =
                ShareToken::issue(project_id, version_id, caller_id, expires_at, max_views);
            tx.insert_share(&share).await?;
            Ok((secret, share))
        }
        .await;

        match outcome {
            Ok((secret, share)) => {
                tx.commit().await?;
                tracing::info!(share_id = %share.id, version_id = %share.version_id, "issued share token");
                Ok((secret, share))
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Validate a bearer secret and consume one view.
    ///
    /// The view increment is a single conditional update inside the
    /// transaction, so concurrent validations cannot overrun the budget.
    pub async fn validate(&self, secret: &str) -> Result<ShareContext, KernelError> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<ShareContext, KernelError> = async {
            let share = tx
                .share_by_hash(&hash_secret(secret))
                .await?
                .ok_or_else(|| KernelError::not_found("share token"))?;

            match share.state(Utc::now()) {
                ShareState::Revoked => return Err(KernelError::Revoked),
                ShareState::Expired => return Err(KernelError::Expired),
                ShareState::ViewLimitReached => return Err(KernelError::ViewLimit),
                ShareState::Active => {}
            }

            if !tx.increment_share_views(share.id).await? {
                return Err(KernelError::ViewLimit);
            }
            let share = tx
                .share(share.id)
                .await?
                .ok_or_else(|| KernelError::not_found("share token"))?;

            let version = tx
                .version(share.version_id)
                .await?
                .ok_or_else(|| KernelError::not_found(format!("version {}", share.version_id)))?;
            let (points, walls, articles) = load_graph(&mut tx, share.version_id).await?;

            Ok(ShareContext {
                share,
                graph: GraphSnapshot::new(version, points, walls, articles),
            })
        }
        .await;

        match outcome {
            Ok(context) => {
                tx.commit().await?;
                tracing::debug!(
                    share_id = %context.share.id,
                    views = context.share.views_count,
                    "validated share token"
                );
                Ok(context)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Revoke a share token. Idempotent: revoking twice is not an error.
    pub async fn revoke(&self, share_id: ShareId, caller_id: &str) -> Result<(), KernelError> {
        let mut tx = self.store.begin().await?;
        let outcome: Result<(), KernelError> = async {
            let mut share = tx
                .share(share_id)
                .await?
                .ok_or_else(|| KernelError::not_found(format!("share {share_id}")))?;
            let project = tx
                .project(share.project_id)
                .await?
                .ok_or_else(|| KernelError::not_found(format!("project {}", share.project_id)))?;
            if project.owner_id != caller_id {
                return Err(KernelError::forbidden(
                    "only the project owner may revoke share tokens",
                ));
            }
            share.revoke(Utc::now());
            tx.update_share(&share).await?;
            Ok(())
        }
        .await;

        match outcome {
            Ok(()) => {
                tx.commit().await?;
                tracing::info!(share_id = %share_id, "revoked share token");
                Ok(())
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}
