use anyhow::Result;
use async_trait::async_trait;
use diesel::{Connection, RunQueryDsl, dsl::not, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;

use crate::{
    domain::{
        entities::plans::{PlanEntity, UpsertPlanEntity},
        repositories::plans::PlanRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::plans},
};

pub struct PlanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PlanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PlanRepository for PlanPostgres {
    async fn find_active_by_price_id(&self, price_id: &str) -> Result<Option<PlanEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let price_id = price_id.to_string();

        Ok(task::spawn_blocking(move || -> Result<Option<PlanEntity>> {
            let mut conn = db_pool.get()?;

            let plan = plans::table
                .filter(plans::price_id.eq(&price_id))
                .filter(plans::active.eq(true))
                .select(PlanEntity::as_select())
                .first::<PlanEntity>(&mut conn)
                .optional()?;

            Ok(plan)
        })
        .await??)
    }

    async fn find_active_by_slug(&self, plan_slug: &str) -> Result<Option<PlanEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let plan_slug = plan_slug.to_string();

        Ok(task::spawn_blocking(move || -> Result<Option<PlanEntity>> {
            let mut conn = db_pool.get()?;

            let plan = plans::table
                .filter(plans::plan_slug.eq(&plan_slug))
                .filter(plans::active.eq(true))
                .order((plans::sort_order.asc(), plans::unit_amount.asc()))
                .select(PlanEntity::as_select())
                .first::<PlanEntity>(&mut conn)
                .optional()?;

            Ok(plan)
        })
        .await??)
    }

    async fn list_active_plans(&self) -> Result<Vec<PlanEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<PlanEntity>> {
            let mut conn = db_pool.get()?;

            let results = plans::table
                .filter(plans::active.eq(true))
                .order((plans::sort_order.asc(), plans::unit_amount.asc()))
                .select(PlanEntity::as_select())
                .load::<PlanEntity>(&mut conn)?;

            Ok(results)
        })
        .await??)
    }

    async fn sync_product_plans(
        &self,
        product_id: &str,
        upserts: Vec<UpsertPlanEntity>,
        active_price_ids: Vec<String>,
    ) -> Result<usize> {
        let db_pool = Arc::clone(&self.db_pool);
        let product_id = product_id.to_string();

        Ok(task::spawn_blocking(move || -> Result<usize> {
            let mut conn = db_pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|tx| {
                for plan in &upserts {
                    insert_into(plans::table)
                        .values(plan)
                        .on_conflict(plans::price_id)
                        .do_update()
                        .set(plan)
                        .execute(tx)?;
                }

                // An empty remote set is treated as a failed listing, not as
                // "every price was archived".
                if !active_price_ids.is_empty() {
                    update(
                        plans::table
                            .filter(plans::product_id.eq(&product_id))
                            .filter(plans::active.eq(true))
                            .filter(not(plans::price_id.eq_any(&active_price_ids))),
                    )
                    .set(plans::active.eq(false))
                    .execute(tx)?;
                }

                Ok(upserts.len())
            })
        })
        .await??)
    }
}
