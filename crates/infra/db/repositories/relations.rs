use anyhow::Result;
use async_trait::async_trait;
use diesel::{Connection, RunQueryDsl, insert_into, prelude::*};
use serde_json::json;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            notifications::{InsertNotificationEntity, NotificationEntity},
            user_credit_events::{InsertUserCreditEventEntity, REASON_SUPERLIKE_SENT},
            user_relations::{InsertUserRelationEntity, RELATION_LIKE, RELATION_SUPERLIKE},
        },
        repositories::relations::RelationRepository,
        value_objects::{credits::SuperlikeReceipt, enums::credit_kinds::CreditKind},
    },
    infra::db::{
        postgres::{
            postgres_connection::PgPoolSquad,
            schema::{notifications, user_relations},
        },
        repositories::ledger,
    },
};

pub const NOTIFICATION_SUPERLIKE: &str = "superlike";

pub struct RelationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl RelationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RelationRepository for RelationPostgres {
    async fn send_superlike(&self, actor_id: Uuid, target_id: Uuid) -> Result<Option<SuperlikeReceipt>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<SuperlikeReceipt>> {
            let mut conn = db_pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|tx| {
                let Some(remaining) = ledger::take_one_credit(tx, actor_id, CreditKind::Superlike)?
                else {
                    return Ok(None);
                };

                // A superlike is also a like; both edges are idempotent.
                let relations = [RELATION_LIKE, RELATION_SUPERLIKE].map(|kind| InsertUserRelationEntity {
                    actor_id,
                    target_id,
                    kind: kind.to_string(),
                });
                insert_into(user_relations::table)
                    .values(&relations[..])
                    .on_conflict_do_nothing()
                    .execute(tx)?;

                let notification = insert_into(notifications::table)
                    .values(&InsertNotificationEntity {
                        user_id: target_id,
                        type_: NOTIFICATION_SUPERLIKE.to_string(),
                        actor_id: Some(actor_id),
                        payload: json!({ "super": true }),
                    })
                    .returning(NotificationEntity::as_returning())
                    .get_result::<NotificationEntity>(tx)?;

                ledger::record_event(
                    tx,
                    &InsertUserCreditEventEntity::new(
                        actor_id,
                        CreditKind::Superlike,
                        -1,
                        REASON_SUPERLIKE_SENT,
                    )
                    .related_to(target_id),
                )?;

                Ok(Some(SuperlikeReceipt {
                    notification,
                    remaining,
                }))
            })
        })
        .await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::repositories::test_db;

    fn relation_kinds(db_pool: &PgPoolSquad, actor_id: Uuid) -> Vec<String> {
        let mut conn = db_pool.get().unwrap();
        user_relations::table
            .filter(user_relations::actor_id.eq(actor_id))
            .select(user_relations::kind)
            .order(user_relations::kind.asc())
            .load::<String>(&mut conn)
            .unwrap()
    }

    fn notification_count(db_pool: &PgPoolSquad, user_ids: &[Uuid]) -> i64 {
        let mut conn = db_pool.get().unwrap();
        notifications::table
            .filter(notifications::user_id.eq_any(user_ids))
            .count()
            .get_result::<i64>(&mut conn)
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore]
    async fn two_concurrent_superlikes_on_one_credit() {
        let db_pool = test_db::pool();
        let actor_id = test_db::insert_user(&db_pool);
        let first_target = test_db::insert_user(&db_pool);
        let second_target = test_db::insert_user(&db_pool);
        test_db::fund(&db_pool, actor_id, CreditKind::Superlike, 1).await;

        let repository = Arc::new(RelationPostgres::new(Arc::clone(&db_pool)));
        let first = tokio::spawn({
            let repository = Arc::clone(&repository);
            async move { repository.send_superlike(actor_id, first_target).await.unwrap() }
        });
        let second = tokio::spawn({
            let repository = Arc::clone(&repository);
            async move { repository.send_superlike(actor_id, second_target).await.unwrap() }
        });

        let receipts: Vec<_> = [first.await.unwrap(), second.await.unwrap()]
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].remaining, 0);
        assert_eq!(receipts[0].notification.actor_id, Some(actor_id));

        assert_eq!(test_db::balance(&db_pool, actor_id, CreditKind::Superlike), 0);
        let spent: Vec<_> = test_db::ledger_deltas(&db_pool, actor_id, CreditKind::Superlike)
            .into_iter()
            .filter(|(delta, _)| *delta < 0)
            .collect();
        assert_eq!(spent, vec![(-1, Some(REASON_SUPERLIKE_SENT.to_string()))]);
        assert_eq!(test_db::ledger_sum(&db_pool, actor_id, CreditKind::Superlike), 0);

        // The losing call rolled back: only the winner's edges and notification exist.
        assert_eq!(relation_kinds(&db_pool, actor_id), vec![RELATION_LIKE, RELATION_SUPERLIKE]);
        assert_eq!(notification_count(&db_pool, &[first_target, second_target]), 1);
    }

    #[tokio::test]
    #[ignore]
    async fn superlike_without_credit_writes_nothing() {
        let db_pool = test_db::pool();
        let actor_id = test_db::insert_user(&db_pool);
        let target_id = test_db::insert_user(&db_pool);

        let repository = RelationPostgres::new(Arc::clone(&db_pool));
        assert!(repository.send_superlike(actor_id, target_id).await.unwrap().is_none());

        assert!(relation_kinds(&db_pool, actor_id).is_empty());
        assert_eq!(notification_count(&db_pool, &[target_id]), 0);
        assert!(test_db::ledger_deltas(&db_pool, actor_id, CreditKind::Superlike).is_empty());
    }
}
