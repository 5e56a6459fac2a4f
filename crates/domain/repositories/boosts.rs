use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{entities::user_boosts::UserBoostEntity, value_objects::credits::BoostActivation};

#[async_trait]
#[automock]
pub trait BoostRepository {
    async fn activate_boost(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<BoostActivation>>;

    async fn list_active_boosts(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserBoostEntity>>;
}
