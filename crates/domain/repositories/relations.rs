use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::credits::SuperlikeReceipt;

#[async_trait]
#[automock]
pub trait RelationRepository {
    /// Spends a superlike, records the like/superlike relations and the target's
    /// notification in one transaction. `None` when the actor has no superlikes.
    async fn send_superlike(&self, actor_id: Uuid, target_id: Uuid) -> Result<Option<SuperlikeReceipt>>;
}
