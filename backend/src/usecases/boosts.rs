use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use crates::domain::{
    entities::user_boosts::UserBoostEntity, repositories::boosts::BoostRepository,
    value_objects::credits::BoostActivation,
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

#[derive(Debug, Error)]
pub enum BoostError {
    #[error("not enough credits")]
    InsufficientCredit,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError for BoostError {
    fn status_code(&self) -> StatusCode {
        match self {
            BoostError::InsufficientCredit => StatusCode::BAD_REQUEST,
            BoostError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BoostError>;

pub struct BoostUseCase<B>
where
    B: BoostRepository + Send + Sync + 'static,
{
    boost_repo: Arc<B>,
    boost_minutes: i64,
}

impl<B> BoostUseCase<B>
where
    B: BoostRepository + Send + Sync + 'static,
{
    pub fn new(boost_repo: Arc<B>, boost_minutes: i64) -> Self {
        Self {
            boost_repo,
            boost_minutes,
        }
    }

    pub async fn activate(&self, user_id: Uuid) -> UseCaseResult<BoostActivation> {
        let expires_at = Utc::now() + Duration::minutes(self.boost_minutes);

        let activation = self
            .boost_repo
            .activate_boost(user_id, expires_at)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "boosts: activation failed");
                BoostError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%user_id, "boosts: no boost credits left");
                BoostError::InsufficientCredit
            })?;

        info!(
            %user_id,
            boost_id = %activation.boost.id,
            expires_at = %activation.boost.expires_at,
            remaining = activation.remaining,
            "boosts: boost activated"
        );
        Ok(activation)
    }

    pub async fn list_active(&self, user_id: Uuid) -> UseCaseResult<Vec<UserBoostEntity>> {
        self.boost_repo
            .list_active_boosts(user_id, Utc::now())
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "boosts: failed to list active boosts");
                BoostError::Internal(err)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::InMemoryStore;
    use crates::domain::{
        entities::user_credit_events::REASON_BOOST_ACTIVATED,
        repositories::boosts::MockBoostRepository,
        value_objects::enums::credit_kinds::CreditKind,
    };

    #[tokio::test]
    async fn activation_spends_one_boost_and_expires_after_configured_minutes() {
        let user_id = Uuid::new_v4();
        let store = Arc::new(InMemoryStore::new());
        store.seed_credits(user_id, CreditKind::Boost, 2);
        let usecase = BoostUseCase::new(store.clone(), 45);

        let before = Utc::now();
        let activation = usecase.activate(user_id).await.unwrap();

        assert_eq!(activation.remaining, 1);
        assert!(activation.boost.expires_at >= before + Duration::minutes(45));
        assert!(activation.boost.expires_at <= Utc::now() + Duration::minutes(45));
        assert_eq!(store.events_with_reason(user_id, REASON_BOOST_ACTIVATED).len(), 1);

        let active = usecase.list_active(user_id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, activation.boost.id);
    }

    #[tokio::test]
    async fn no_boost_credits_is_insufficient() {
        let mut boost_repo = MockBoostRepository::new();
        boost_repo
            .expect_activate_boost()
            .times(1)
            .returning(|_, _| Box::pin(async move { Ok(None) }));

        let usecase = BoostUseCase::new(Arc::new(boost_repo), 30);
        let err = usecase.activate(Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, BoostError::InsufficientCredit));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
