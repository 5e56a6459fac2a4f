use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::credit_kinds::CreditKind,
    infra::db::postgres::schema::user_credit_events,
};

pub const REASON_PURCHASE: &str = "purchase";
pub const REASON_TOKEN_USED: &str = "token_used";
pub const REASON_SUPERLIKE_SENT: &str = "superlike_sent";
pub const REASON_BOOST_ACTIVATED: &str = "boost_activated";
pub const REASON_SUBSCRIPTION_PERIOD: &str = "subscription_period";

#[derive(Debug, Clone, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = user_credit_events)]
pub struct UserCreditEventEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub type_: String,
    pub delta: i32,
    pub reason: Option<String>,
    pub related_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Ledger rows are append-only; this is the only write shape the table accepts.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = user_credit_events)]
pub struct InsertUserCreditEventEntity {
    pub user_id: Uuid,
    pub type_: String,
    pub delta: i32,
    pub reason: Option<String>,
    pub related_user_id: Option<Uuid>,
}

impl InsertUserCreditEventEntity {
    pub fn new(user_id: Uuid, kind: CreditKind, delta: i32, reason: &str) -> Self {
        Self {
            user_id,
            type_: kind.to_string(),
            delta,
            reason: Some(reason.to_string()),
            related_user_id: None,
        }
    }

    pub fn related_to(mut self, related_user_id: Uuid) -> Self {
        self.related_user_id = Some(related_user_id);
        self
    }
}
