use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::user_relations;

pub const RELATION_LIKE: &str = "like";
pub const RELATION_SUPERLIKE: &str = "superlike";

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_relations)]
pub struct InsertUserRelationEntity {
    pub actor_id: Uuid,
    pub target_id: Uuid,
    pub kind: String,
}
