use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::{
    fulfilled_purchases::InsertFulfilledPurchaseEntity,
    subscriptions::{SubscriptionEntity, UpdateCachedPlanEntity, UpsertSubscriptionEntity},
};

#[async_trait]
#[automock]
pub trait SubscriptionRepository {
    async fn find_latest_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Upserts the subscription, marks the user premium and records the
    /// fulfilled purchase in one transaction. Replays converge on the same row.
    async fn activate_from_checkout(
        &self,
        subscription: UpsertSubscriptionEntity,
        purchase: InsertFulfilledPurchaseEntity,
    ) -> Result<Uuid>;

    async fn update_cached_plan(
        &self,
        subscription_id: Uuid,
        snapshot: UpdateCachedPlanEntity,
    ) -> Result<()>;
}
