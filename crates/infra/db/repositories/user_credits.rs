use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::{Connection, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            user_credit_events::{
                InsertUserCreditEventEntity, REASON_PURCHASE, REASON_SUBSCRIPTION_PERIOD,
                REASON_TOKEN_USED, UserCreditEventEntity,
            },
            user_credits::UserCreditEntity,
        },
        repositories::user_credits::UserCreditRepository,
        value_objects::{
            credits::{GrantOutcome, PremiumActivation, PurchaseGrant},
            enums::{credit_kinds::CreditKind, purchase_kinds::PurchaseKind},
        },
    },
    infra::db::{
        postgres::{
            postgres_connection::PgPoolSquad,
            schema::{fulfilled_purchases, subscriptions, user_credit_events, user_credits, users},
        },
        repositories::ledger,
    },
};

pub struct UserCreditPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserCreditPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserCreditRepository for UserCreditPostgres {
    async fn get_or_create(&self, user_id: Uuid) -> Result<UserCreditEntity> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<UserCreditEntity> {
            let mut conn = db_pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|tx| {
                ledger::ensure_credit_row(tx, user_id)?;

                let credits = user_credits::table
                    .filter(user_credits::user_id.eq(user_id))
                    .select(UserCreditEntity::as_select())
                    .first::<UserCreditEntity>(tx)?;

                Ok(credits)
            })
        })
        .await??)
    }

    async fn list_events(&self, user_id: Uuid, limit: i64) -> Result<Vec<UserCreditEventEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<UserCreditEventEntity>> {
            let mut conn = db_pool.get()?;

            let events = user_credit_events::table
                .filter(user_credit_events::user_id.eq(user_id))
                .order((user_credit_events::created_at.desc(), user_credit_events::id.desc()))
                .limit(limit)
                .select(UserCreditEventEntity::as_select())
                .load::<UserCreditEventEntity>(&mut conn)?;

            Ok(events)
        })
        .await??)
    }

    async fn grant_purchase(&self, purchase: PurchaseGrant) -> Result<GrantOutcome> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<GrantOutcome> {
            let mut conn = db_pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|tx| {
                let marker = insert_into(fulfilled_purchases::table)
                    .values((
                        fulfilled_purchases::purchase_ref.eq(&purchase.purchase_ref),
                        fulfilled_purchases::user_id.eq(purchase.user_id),
                        fulfilled_purchases::purchase_kind.eq(PurchaseKind::OneTime.to_string()),
                        fulfilled_purchases::credit_type.eq(Some(purchase.grant.kind.to_string())),
                        fulfilled_purchases::quantity.eq(purchase.grant.quantity),
                    ))
                    .on_conflict(fulfilled_purchases::purchase_ref)
                    .do_nothing()
                    .returning(fulfilled_purchases::id)
                    .get_result::<Uuid>(tx)
                    .optional()?;

                if marker.is_none() {
                    return Ok(GrantOutcome::AlreadyApplied);
                }

                let credits = ledger::add_credits(
                    tx,
                    purchase.user_id,
                    purchase.grant.kind,
                    purchase.grant.quantity,
                )?;
                ledger::record_event(
                    tx,
                    &InsertUserCreditEventEntity::new(
                        purchase.user_id,
                        purchase.grant.kind,
                        purchase.grant.quantity,
                        REASON_PURCHASE,
                    ),
                )?;

                Ok(GrantOutcome::Applied(credits))
            })
        })
        .await??)
    }

    async fn activate_premium_token(
        &self,
        user_id: Uuid,
        premium_days: i64,
    ) -> Result<Option<PremiumActivation>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<PremiumActivation>> {
            let mut conn = db_pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|tx| {
                if ledger::take_one_credit(tx, user_id, CreditKind::Premium)?.is_none() {
                    return Ok(None);
                }

                let current_until = users::table
                    .filter(users::id.eq(user_id))
                    .select(users::premium_until)
                    .for_update()
                    .first::<Option<DateTime<Utc>>>(tx)
                    .optional()?;

                let Some(current_until) = current_until else {
                    bail!("user {user_id} not found while activating premium token");
                };

                let premium_until = extend_premium(current_until, Utc::now(), premium_days);

                update(users::table.filter(users::id.eq(user_id)))
                    .set((
                        users::is_premium.eq(true),
                        users::premium_until.eq(Some(premium_until)),
                    ))
                    .execute(tx)?;

                ledger::record_event(
                    tx,
                    &InsertUserCreditEventEntity::new(user_id, CreditKind::Premium, -1, REASON_TOKEN_USED),
                )?;

                let credits = user_credits::table
                    .filter(user_credits::user_id.eq(user_id))
                    .select(UserCreditEntity::as_select())
                    .first::<UserCreditEntity>(tx)?;

                Ok(Some(PremiumActivation {
                    credits,
                    premium_until,
                }))
            })
        })
        .await??)
    }

    async fn grant_subscription_period(
        &self,
        subscription_id: Uuid,
        user_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        quantity: i32,
    ) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|tx| {
                let claimed = update(
                    subscriptions::table
                        .filter(subscriptions::id.eq(subscription_id))
                        .filter(
                            subscriptions::last_granted_period_end
                                .is_null()
                                .or(subscriptions::last_granted_period_end.lt(period_end)),
                        ),
                )
                .set((
                    subscriptions::last_granted_period_start.eq(Some(period_start)),
                    subscriptions::last_granted_period_end.eq(Some(period_end)),
                ))
                .execute(tx)?;

                if claimed == 0 {
                    return Ok(false);
                }

                ledger::add_credits(tx, user_id, CreditKind::Superlike, quantity)?;
                ledger::record_event(
                    tx,
                    &InsertUserCreditEventEntity::new(
                        user_id,
                        CreditKind::Superlike,
                        quantity,
                        REASON_SUBSCRIPTION_PERIOD,
                    ),
                )?;

                Ok(true)
            })
        })
        .await??)
    }
}

/// New premium expiry: `days` after whichever is later of now and the current expiry.
pub fn extend_premium(
    current_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    days: i64,
) -> DateTime<Utc> {
    let base = match current_until {
        Some(until) if until > now => until,
        _ => now,
    };
    base + Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::value_objects::credits::CreditGrant, infra::db::repositories::test_db};
    use chrono::TimeZone;

    #[test]
    fn premium_extends_from_now_when_expired() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let expired = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

        assert_eq!(
            extend_premium(Some(expired), now, 30),
            Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap()
        );
        assert_eq!(
            extend_premium(None, now, 30),
            Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn premium_stacks_on_remaining_time() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap();

        assert_eq!(
            extend_premium(Some(until), now, 30),
            Utc.with_ymd_and_hms(2025, 4, 10, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore]
    async fn concurrent_premium_tokens_never_overspend() {
        let db_pool = test_db::pool();
        let user_id = test_db::insert_user(&db_pool);
        test_db::fund(&db_pool, user_id, CreditKind::Premium, 3).await;

        let repository = Arc::new(UserCreditPostgres::new(Arc::clone(&db_pool)));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let repository = Arc::clone(&repository);
            handles.push(tokio::spawn(async move {
                repository.activate_premium_token(user_id, 30).await.unwrap()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                successes += 1;
            }
        }
        assert_eq!(successes, 3);
        assert_eq!(test_db::balance(&db_pool, user_id, CreditKind::Premium), 0);

        let deltas = test_db::ledger_deltas(&db_pool, user_id, CreditKind::Premium);
        assert_eq!(deltas.len(), 4);
        assert_eq!(
            deltas
                .iter()
                .filter(|(delta, reason)| *delta == -1 && reason.as_deref() == Some(REASON_TOKEN_USED))
                .count(),
            3
        );
        assert_eq!(test_db::ledger_sum(&db_pool, user_id, CreditKind::Premium), 0);
    }

    #[tokio::test]
    #[ignore]
    async fn same_purchase_ref_grants_once() {
        let db_pool = test_db::pool();
        let user_id = test_db::insert_user(&db_pool);
        let repository = UserCreditPostgres::new(Arc::clone(&db_pool));
        let purchase = PurchaseGrant {
            purchase_ref: format!("cs_test_{user_id}"),
            user_id,
            grant: CreditGrant {
                kind: CreditKind::Boost,
                quantity: 5,
            },
        };

        let first = repository.grant_purchase(purchase.clone()).await.unwrap();
        let second = repository.grant_purchase(purchase).await.unwrap();

        assert!(matches!(first, GrantOutcome::Applied(ref credits) if credits.boost_credits == 5));
        assert_eq!(second, GrantOutcome::AlreadyApplied);
        assert_eq!(test_db::balance(&db_pool, user_id, CreditKind::Boost), 5);
        assert_eq!(test_db::ledger_sum(&db_pool, user_id, CreditKind::Boost), 5);
    }
}
