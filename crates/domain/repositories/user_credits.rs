use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::{user_credit_events::UserCreditEventEntity, user_credits::UserCreditEntity},
    value_objects::credits::{GrantOutcome, PremiumActivation, PurchaseGrant},
};

#[async_trait]
#[automock]
pub trait UserCreditRepository {
    /// Balances for `user_id`, creating an all-zero row on first access.
    async fn get_or_create(&self, user_id: Uuid) -> Result<UserCreditEntity>;

    /// Latest ledger rows, newest first.
    async fn list_events(&self, user_id: Uuid, limit: i64) -> Result<Vec<UserCreditEventEntity>>;

    async fn grant_purchase(&self, purchase: PurchaseGrant) -> Result<GrantOutcome>;

    async fn activate_premium_token(
        &self,
        user_id: Uuid,
        premium_days: i64,
    ) -> Result<Option<PremiumActivation>>;

    /// Grants `quantity` superlikes for the billing period ending at `period_end`
    /// unless that period was already granted. Returns whether a grant happened.
    async fn grant_subscription_period(
        &self,
        subscription_id: Uuid,
        user_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        quantity: i32,
    ) -> Result<bool>;
}
