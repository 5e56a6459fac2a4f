use anyhow::Result;
use async_trait::async_trait;
use diesel::{Connection, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            fulfilled_purchases::InsertFulfilledPurchaseEntity,
            subscriptions::{SubscriptionEntity, UpdateCachedPlanEntity, UpsertSubscriptionEntity},
        },
        repositories::subscriptions::SubscriptionRepository,
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{fulfilled_purchases, subscriptions, users},
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_latest_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let subscription = subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .order(subscriptions::created_at.desc())
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(&mut conn)
                .optional()?;

            Ok(subscription)
        })
        .await??)
    }

    async fn activate_from_checkout(
        &self,
        subscription: UpsertSubscriptionEntity,
        purchase: InsertFulfilledPurchaseEntity,
    ) -> Result<Uuid> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Uuid> {
            let mut conn = db_pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|tx| {
                let subscription_id = insert_into(subscriptions::table)
                    .values(&subscription)
                    .on_conflict(subscriptions::stripe_subscription_id)
                    .do_update()
                    .set(&subscription)
                    .returning(subscriptions::id)
                    .get_result::<Uuid>(tx)?;

                update(users::table.filter(users::id.eq(subscription.user_id)))
                    .set(users::is_premium.eq(true))
                    .execute(tx)?;

                insert_into(fulfilled_purchases::table)
                    .values(&purchase)
                    .on_conflict(fulfilled_purchases::purchase_ref)
                    .do_nothing()
                    .execute(tx)?;

                Ok(subscription_id)
            })
        })
        .await??)
    }

    async fn update_cached_plan(
        &self,
        subscription_id: Uuid,
        snapshot: UpdateCachedPlanEntity,
    ) -> Result<()> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db_pool.get()?;

            update(subscriptions::table.filter(subscriptions::id.eq(subscription_id)))
                .set(&snapshot)
                .execute(&mut conn)?;

            Ok(())
        })
        .await?
    }
}
