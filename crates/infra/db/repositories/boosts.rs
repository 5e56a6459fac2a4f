use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{Connection, RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            user_boosts::{InsertUserBoostEntity, UserBoostEntity},
            user_credit_events::{InsertUserCreditEventEntity, REASON_BOOST_ACTIVATED},
        },
        repositories::boosts::BoostRepository,
        value_objects::{credits::BoostActivation, enums::credit_kinds::CreditKind},
    },
    infra::db::{
        postgres::{postgres_connection::PgPoolSquad, schema::user_boosts},
        repositories::ledger,
    },
};

pub struct BoostPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BoostPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BoostRepository for BoostPostgres {
    async fn activate_boost(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<BoostActivation>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<BoostActivation>> {
            let mut conn = db_pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|tx| {
                let Some(remaining) = ledger::take_one_credit(tx, user_id, CreditKind::Boost)? else {
                    return Ok(None);
                };

                let boost = insert_into(user_boosts::table)
                    .values(&InsertUserBoostEntity {
                        user_id,
                        activated_at: Utc::now(),
                        expires_at,
                    })
                    .returning(UserBoostEntity::as_returning())
                    .get_result::<UserBoostEntity>(tx)?;

                ledger::record_event(
                    tx,
                    &InsertUserCreditEventEntity::new(
                        user_id,
                        CreditKind::Boost,
                        -1,
                        REASON_BOOST_ACTIVATED,
                    ),
                )?;

                Ok(Some(BoostActivation { boost, remaining }))
            })
        })
        .await??)
    }

    async fn list_active_boosts(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserBoostEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<UserBoostEntity>> {
            let mut conn = db_pool.get()?;

            let boosts = user_boosts::table
                .filter(user_boosts::user_id.eq(user_id))
                .filter(user_boosts::expires_at.gt(now))
                .order(user_boosts::expires_at.desc())
                .select(UserBoostEntity::as_select())
                .load::<UserBoostEntity>(&mut conn)?;

            Ok(boosts)
        })
        .await??)
    }
}
