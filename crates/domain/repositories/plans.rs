use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::plans::{PlanEntity, UpsertPlanEntity};

#[async_trait]
#[automock]
pub trait PlanRepository {
    async fn find_active_by_price_id(&self, price_id: &str) -> Result<Option<PlanEntity>>;
    async fn find_active_by_slug(&self, plan_slug: &str) -> Result<Option<PlanEntity>>;
    async fn list_active_plans(&self) -> Result<Vec<PlanEntity>>;

    /// Upserts `plans` by price id and deactivates rows of `product_id` whose
    /// price is not in `active_price_ids`. Returns the number of upserted rows.
    async fn sync_product_plans(
        &self,
        product_id: &str,
        plans: Vec<UpsertPlanEntity>,
        active_price_ids: Vec<String>,
    ) -> Result<usize>;
}
