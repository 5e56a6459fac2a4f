use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::{
    entities::user_credit_events::UserCreditEventEntity,
    repositories::user_credits::UserCreditRepository,
    value_objects::{
        credits::{CreditBalances, PremiumActivation},
        enums::credit_kinds::CreditKind,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

pub const HISTORY_LIMIT: i64 = 200;

#[derive(Debug, Error)]
pub enum CreditError {
    #[error("not enough credits")]
    InsufficientCredit,
    #[error("invalid credit type: {0}")]
    InvalidKind(String),
    #[error("{0} credits are consumed by feature endpoints")]
    FeatureOnly(CreditKind),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError for CreditError {
    fn status_code(&self) -> StatusCode {
        match self {
            CreditError::InsufficientCredit
            | CreditError::InvalidKind(_)
            | CreditError::FeatureOnly(_) => StatusCode::BAD_REQUEST,
            CreditError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, CreditError>;

pub struct CreditUseCase<U>
where
    U: UserCreditRepository + Send + Sync + 'static,
{
    credit_repo: Arc<U>,
    premium_token_days: i64,
}

impl<U> CreditUseCase<U>
where
    U: UserCreditRepository + Send + Sync + 'static,
{
    pub fn new(credit_repo: Arc<U>, premium_token_days: i64) -> Self {
        Self {
            credit_repo,
            premium_token_days,
        }
    }

    pub async fn get_balances(&self, user_id: Uuid) -> UseCaseResult<CreditBalances> {
        let credits = self.credit_repo.get_or_create(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "credits: failed to load balances");
            CreditError::Internal(err)
        })?;

        Ok(CreditBalances::from(&credits))
    }

    pub async fn history(&self, user_id: Uuid) -> UseCaseResult<Vec<UserCreditEventEntity>> {
        let events = self
            .credit_repo
            .list_events(user_id, HISTORY_LIMIT)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "credits: failed to load ledger history");
                CreditError::Internal(err)
            })?;

        info!(%user_id, event_count = events.len(), "credits: ledger history loaded");
        Ok(events)
    }

    /// `POST /credits/use`. Only premium tokens are spendable here; superlikes
    /// and boosts go through their own endpoints.
    pub async fn use_credit(&self, user_id: Uuid, raw_kind: &str) -> UseCaseResult<PremiumActivation> {
        let kind = CreditKind::from_str(raw_kind).ok_or_else(|| {
            warn!(%user_id, raw_kind, "credits: invalid credit type");
            CreditError::InvalidKind(raw_kind.to_string())
        })?;

        if kind != CreditKind::Premium {
            warn!(%user_id, kind = %kind, "credits: credit type not usable directly");
            return Err(CreditError::FeatureOnly(kind));
        }

        let activation = self
            .credit_repo
            .activate_premium_token(user_id, self.premium_token_days)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "credits: premium token activation failed");
                CreditError::Internal(err)
            })?;

        match activation {
            Some(activation) => {
                info!(
                    %user_id,
                    premium_until = %activation.premium_until,
                    remaining = activation.credits.premium_tokens,
                    "credits: premium token used"
                );
                Ok(activation)
            }
            None => {
                warn!(%user_id, "credits: no premium tokens left");
                Err(CreditError::InsufficientCredit)
            }
        }
    }
}
