use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::repositories::relations::RelationRepository;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{axum_http::error_responses::ApiError, realtime::registry::NotificationRegistry};

#[derive(Debug, Error)]
pub enum RelationError {
    #[error("cannot superlike yourself")]
    SelfTarget,
    #[error("not enough credits")]
    InsufficientCredit,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError for RelationError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelationError::SelfTarget | RelationError::InsufficientCredit => StatusCode::BAD_REQUEST,
            RelationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuperlikeResult {
    pub superlike: bool,
    pub remaining: i32,
}

pub type UseCaseResult<T> = std::result::Result<T, RelationError>;

pub struct SuperlikeUseCase<R>
where
    R: RelationRepository + Send + Sync + 'static,
{
    relation_repo: Arc<R>,
    registry: Arc<NotificationRegistry>,
}

impl<R> SuperlikeUseCase<R>
where
    R: RelationRepository + Send + Sync + 'static,
{
    pub fn new(relation_repo: Arc<R>, registry: Arc<NotificationRegistry>) -> Self {
        Self {
            relation_repo,
            registry,
        }
    }

    /// Spends a superlike on `target_id`. The live push happens only after the
    /// credit, relations and notification are committed.
    pub async fn send_superlike(&self, actor_id: Uuid, target_id: Uuid) -> UseCaseResult<SuperlikeResult> {
        if actor_id == target_id {
            warn!(%actor_id, "relations: self superlike rejected");
            return Err(RelationError::SelfTarget);
        }

        let receipt = self
            .relation_repo
            .send_superlike(actor_id, target_id)
            .await
            .map_err(|err| {
                error!(%actor_id, %target_id, db_error = ?err, "relations: superlike failed");
                RelationError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%actor_id, %target_id, "relations: no superlike credits left");
                RelationError::InsufficientCredit
            })?;

        let delivered = self.registry.publish(target_id, &receipt.notification);
        info!(
            %actor_id,
            %target_id,
            remaining = receipt.remaining,
            delivered,
            "relations: superlike sent"
        );

        Ok(SuperlikeResult {
            superlike: true,
            remaining: receipt.remaining,
        })
    }
}
