use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::user_boosts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = user_boosts)]
pub struct UserBoostEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_boosts)]
pub struct InsertUserBoostEntity {
    pub user_id: Uuid,
    pub activated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
